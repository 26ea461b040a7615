//! main.rs
#![forbid(unsafe_code)]

use backfill_lib::backfill::Backfill;
use backfill_lib::stop_signal::StopSignal;
use common_lib::init::init;
use common_lib::settings::Settings;

/// main
fn main() {
    init(env!("CARGO_MANIFEST_DIR"));

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("[main] could not load settings: {}", &e);
            std::process::exit(2);
        }
    };

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("backfill")
        .enable_all()
        .build()
        .expect("Tokio runtime didn't start");

    let all_ok = tokio_runtime.block_on(async {
        // ctrl-c lets every in-flight page finish, then each run stops with its resume point logged
        let stop = StopSignal::new();
        let stop_ctrl_c = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("[main] ctrl-c: stopping after the current page");
                stop_ctrl_c.stop();
            }
        });

        match Backfill::run(&settings, stop).await {
            Ok(results) => {
                let mut all_ok = true;
                for result in results {
                    match result {
                        Ok(summary) => {
                            tracing::info!("[main] {}", &summary);
                            all_ok &= summary.outcome.is_success();
                        }
                        Err(e) => {
                            tracing::error!("[main] run aborted: {}", &e);
                            all_ok = false;
                        }
                    }
                }
                all_ok
            }
            Err(e) => {
                tracing::error!("[main] backfill could not start: {}", &e);
                false
            }
        }
    });

    if !all_ok {
        std::process::exit(1);
    }
}
