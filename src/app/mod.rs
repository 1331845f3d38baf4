pub mod args;
mod setup;

pub use args::AppArgs;

use crate::logging::export_to_dir;
use crate::simulator::{ActionButton, Simulator};
use crate::web::{self, AppState};
use anyhow::Result;
use tracing::info;

pub async fn launch() -> Result<()> {
    launch_with_args(AppArgs::from_cli()).await
}

pub async fn launch_with_args(args: AppArgs) -> Result<()> {
    let setup::PreparedApp {
        args,
        addr,
        store,
        handlers,
    } = setup::prepare(args)?;

    match args.simulate {
        Some(rounds) => {
            let mut simulator = Simulator::new(store.clone(), handlers);
            match args.simulate_button.as_deref().and_then(ActionButton::find) {
                Some(button) => simulator.run_buttons(&[button], rounds).await,
                None => simulator.run(rounds).await,
            };
        }
        None => {
            web::start_server(
                AppState {
                    store: store.clone(),
                    handlers,
                },
                addr,
            )
            .await?;
        }
    }

    if let Some(dir) = &args.export_dir {
        let path = export_to_dir(&store.snapshot(), dir)?;
        info!("Exported {} client log entries to {}", store.len(), path.display());
    }

    Ok(())
}
