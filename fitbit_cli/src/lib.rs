pub mod fitbit_cli_opts;
