use dotenvy::dotenv;
use pushkind_pigeon::campaign::run;
use pushkind_pigeon::config::Settings;

/// Entry point for the campaign worker.
#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenv().ok();

    // mail-send builds its own rustls config; make the provider unambiguous
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(settings).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}
