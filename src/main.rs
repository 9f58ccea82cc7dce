use std::collections::HashMap;
use std::process::ExitCode;

use protoprobe::error::ProbeError;
use protoprobe::interpreter::WorkItem;
use protoprobe::{args, descriptor::DescriptorStore, driver::Driver, emitter, logging, postprocess, probe::ProbeClient};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match args::parse() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = logging::init(&config.log_file, config.verbose) {
        eprintln!("could not initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    if let Err(err) = run(config).await {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(config: args::Config) -> Result<(), ProbeError> {
    let headers: HashMap<String, String> = config.headers.into_iter().collect();
    let client = ProbeClient::new(&config.method, &config.url, headers)?;

    client.preflight().await?;

    let mut store = DescriptorStore::new();
    store.ensure_package(&config.package);
    store.find_or_create_message(&config.package, &config.message);

    let root = WorkItem::root(config.package.clone(), config.message.clone());
    let driver = Driver::new(&client, config.max_depth);
    driver.run(&mut store, root).await?;

    postprocess::run(&mut store);

    let files = store.into_files();
    emitter::write_files(&config.output_dir, &files)?;

    log::info!("wrote {} file(s) to {}", files.len(), config.output_dir);

    Ok(())
}
