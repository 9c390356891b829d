use clap::{Arg, ArgAction, Command, value_parser};
use music_machine_server::{ServerConfig, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("Music Machine")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("HTTP backend for the step-sequencer editor")
        .arg(
            Arg::new("host")
                .long("host")
                .env("HOST")
                .value_name("HOST")
                .default_value("0.0.0.0")
                .num_args(1),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .env("PORT")
                .value_name("PORT")
                .default_value("5050")
                .value_parser(value_parser!(u16))
                .num_args(1),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .env("SECRET_KEY")
                .value_name("KEY")
                .hide_env_values(true)
                .num_args(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .env("MUSIC_MACHINE_DEBUG")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: matches
            .get_one::<String>("host")
            .cloned()
            .unwrap_or(defaults.host),
        port: matches.get_one::<u16>("port").copied().unwrap_or(defaults.port),
        secret_key: matches.get_one::<String>("secret-key").cloned(),
        debug: matches.get_flag("debug"),
    };

    run_server(config).await
}
