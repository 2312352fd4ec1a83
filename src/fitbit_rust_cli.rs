use fitbit_cli::fitbit_cli_opts::FitbitCliOpts;

#[tokio::main]
async fn main() {
    env_logger::init();

    match FitbitCliOpts::process_args().await {
        Ok(_) => (),
        Err(e) => {
            if e.to_string().contains("Broken pipe") {
            } else {
                panic!("{}", e)
            }
        }
    }
}
