use monetro::{Config, Result};

pub fn main() -> Result<()> {
    let env = Config::from_env();
    tracing::info!(host = env.host(), port = env.port(), database = env.database(), "from env");

    let config: Config = "monetdb:monetdb@[::1]:50000/demo".parse()?;
    assert_eq!(config.host(), "::1");

    let err = Config::parse(":secret@localhost/demo").unwrap_err();
    tracing::info!("{err}");

    Ok(())
}
