//! MonetDB connection configuration.
use std::{borrow::Cow, env::var, fmt, time::Duration};
use time::UtcOffset;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 50000;

/// Rows requested per page of a result.
pub const DEFAULT_REPLY_SIZE: usize = 100;

/// MonetDB connection config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) user: String,
    pub(crate) pass: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) dbname: String,
    pub(crate) reply_size: usize,
    pub(crate) statement_timeout: Option<Duration>,
    pub(crate) time_zone: Option<UtcOffset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: String::new(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            dbname: String::new(),
            reply_size: DEFAULT_REPLY_SIZE,
            statement_timeout: None,
            time_zone: None,
        }
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `MONETDB_USER`
    /// - `MONETDB_PASSWORD`
    /// - `MONETDB_HOST`
    /// - `MONETDB_PORT`
    /// - `MONETDB_DATABASE`
    ///
    /// Additionally, it also read `DATABASE_URL` to provide missing value from
    /// previous variables before fallback to default value.
    pub fn from_env() -> Config {
        let url = var("DATABASE_URL").ok().and_then(|e| Config::parse(&e).ok());

        macro_rules! env {
            ($name:literal,$or:ident,$def:expr) => {
                match (var($name), url.as_ref()) {
                    (Ok(ok), _) => ok,
                    (Err(_), Some(e)) => e.$or.clone(),
                    (Err(_), None) => $def.into(),
                }
            };
        }

        let user = env!("MONETDB_USER", user, "monetdb");
        let pass = env!("MONETDB_PASSWORD", pass, "monetdb");
        let host = env!("MONETDB_HOST", host, DEFAULT_HOST);
        let dbname = env!("MONETDB_DATABASE", dbname, "demo");

        let port = match (var("MONETDB_PORT"), url.as_ref()) {
            (Ok(ok), _) => ok.parse().unwrap_or(DEFAULT_PORT),
            (Err(_), Some(e)) => e.port,
            (Err(_), None) => DEFAULT_PORT,
        };

        Self { user, pass, host, port, dbname, ..Default::default() }
    }

    /// Parse connection target.
    ///
    /// Accepted forms:
    /// - `[user[:password]@]host[:port]/database`
    /// - `[user[:password]@][ipv6]:port/database`
    ///
    /// The last `@` separates the credentials, so password may contain `@`.
    ///
    /// ```
    /// use monetro::Config;
    ///
    /// let config = Config::parse("me:p@ss@db.local:50001/demo").unwrap();
    /// assert_eq!(config.user(), "me");
    /// assert_eq!(config.password(), "p@ss");
    /// assert_eq!(config.host(), "db.local");
    /// assert_eq!(config.port(), 50001);
    /// assert_eq!(config.database(), "demo");
    /// ```
    pub fn parse(url: &str) -> Result<Config, ParseError> {
        let (credentials, target) = match url.rsplit_once('@') {
            Some((credentials, target)) => (Some(credentials), target),
            None => (None, url),
        };

        let (user, pass) = match credentials {
            None => (String::new(), String::new()),
            Some(credentials) => match credentials.split_once(':') {
                Some(("", _)) => return Err(ParseError::new("user missing")),
                Some((user, pass)) => (user.to_owned(), pass.to_owned()),
                None => (credentials.to_owned(), String::new()),
            },
        };

        let Some((address, dbname)) = target.split_once('/') else {
            return Err(ParseError::new("database missing"));
        };

        if dbname.is_empty() {
            return Err(ParseError::new("database missing"));
        }

        let (host, port) = match address.strip_prefix('[') {
            Some(ipv6) => match ipv6.strip_suffix(']') {
                Some(host) => (host, None),
                None => match ipv6.split_once("]:") {
                    Some((host, port)) => (host, Some(port)),
                    None => return Err(ParseError::new("ipv6 address is not closed")),
                },
            },
            None => match address.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (address, None),
            },
        };

        if host.is_empty() {
            return Err(ParseError::new("host missing"));
        }

        let port = match port {
            Some(port) => port.parse().map_err(|_| ParseError::new("invalid port"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            user,
            pass,
            host: host.to_owned(),
            port,
            dbname: dbname.to_owned(),
            ..Default::default()
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.pass
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.dbname
    }

    /// Rows requested per page, default 100.
    pub fn reply_size(&self) -> usize {
        self.reply_size
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    pub fn time_zone(&self) -> Option<UtcOffset> {
        self.time_zone
    }

    /// Set rows requested per page, zero is treated as one.
    pub fn with_reply_size(mut self, reply_size: usize) -> Self {
        self.reply_size = reply_size.max(1);
        self
    }

    /// Abandon every request that takes longer than `timeout`.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Set the session time zone on connect.
    pub fn with_time_zone(mut self, offset: UtcOffset) -> Self {
        self.time_zone = Some(offset);
        self
    }
}

impl std::str::FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing url.
pub struct ParseError {
    reason: Cow<'static, str>,
}

impl ParseError {
    fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for ParseError { }

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason)
        }
        write!(f, "failed to parse url: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_target() {
        let c = Config::parse("monetdb:monetdb@localhost:50000/monetdb").unwrap();
        assert_eq!(
            (c.user(), c.password(), c.host(), c.port(), c.database()),
            ("monetdb", "monetdb", "localhost", 50000, "monetdb")
        );
    }

    #[test]
    fn defaults() {
        let c = Config::parse("db.example/demo").unwrap();
        assert_eq!((c.user(), c.password()), ("", ""));
        assert_eq!((c.host(), c.port()), ("db.example", 50000));
        assert_eq!(c.reply_size(), DEFAULT_REPLY_SIZE);

        let c = Config::parse("me@localhost/demo").unwrap();
        assert_eq!((c.user(), c.password()), ("me", ""));
    }

    #[test]
    fn password_with_at() {
        let c = Config::parse("me:a@b@c@host:1234/db").unwrap();
        assert_eq!((c.user(), c.password(), c.host(), c.port()), ("me", "a@b@c", "host", 1234));
    }

    #[test]
    fn ipv6() {
        let c = Config::parse("me:pw@[::1]:50001/db").unwrap();
        assert_eq!((c.host(), c.port(), c.database()), ("::1", 50001, "db"));

        let c = Config::parse("[::1]/db").unwrap();
        assert_eq!((c.host(), c.port(), c.database()), ("::1", 50000, "db"));

        assert!(Config::parse("[::1/db").is_err());
        assert!(Config::parse("[::1]x/db").is_err());
    }

    #[test]
    fn invalid() {
        for url in [":pw@host/db", "host:port/db", "host", "host/", "/db", "me@:5000/db"] {
            assert!(Config::parse(url).is_err(), "{url}");
        }
    }

    #[test]
    fn builder() {
        let c = Config::default()
            .with_reply_size(0)
            .with_statement_timeout(Duration::from_secs(3))
            .with_time_zone(UtcOffset::from_hms(2, 0, 0).unwrap());
        assert_eq!(c.reply_size(), 1);
        assert_eq!(c.statement_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(c.time_zone().map(|o| o.whole_hours()), Some(2));
    }
}
