use ccm_cli::app::CcmCli;
use ccm_cli::cli::CliArgs;
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();
    let code = match CcmCli::from_args(&args) {
        Ok(app) => app.run(args).await,
        Err(err) => {
            eprintln!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}
