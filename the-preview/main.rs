use anyhow::{
  Context,
  Result,
};
use the_preview::{
  application,
  cli::CliOptions,
  config::Config,
  logging,
};

fn main() -> Result<()> {
  let exit_code = main_impl()?;
  std::process::exit(exit_code);
}

fn main_impl() -> Result<i32> {
  let options = CliOptions::parse()?;

  the_preview_loader::initialize_config_file(options.config_file.clone());
  the_preview_loader::initialize_log_file(options.log_file.clone());
  logging::setup_logging(options.verbosity, &the_preview_loader::log_file())
    .context("failed to initialize logging")?;

  let mut config = Config::load_user().context("failed to load configuration")?;
  options.apply(&mut config);
  log::debug!("configuration: {config:?}");

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()
    .context("failed to start the async runtime")?;
  let exit_code = runtime.block_on(application::run(options, config))?;
  // let hosts cancelled on close kill their processes before we exit
  runtime.shutdown_timeout(std::time::Duration::from_secs(1));
  Ok(exit_code)
}
