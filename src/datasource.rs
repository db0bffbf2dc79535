//! Pooled database connection source
//!
//! Drivers are outside this crate: callers plug in a [`Connector`] that
//! opens connections and a [`Connection`] type that can report liveness and
//! close itself. Everything else (caps, waiting, reuse) is the pool's job.

use std::collections::HashMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::time::Duration;

use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::handle::PooledObject;
use crate::pool::Pool;

const KEY_MAX_WAIT: &str = "maxWait";
const KEY_INITIAL_SIZE: &str = "initialSize";
const KEY_MAX_ACTIVE: &str = "maxActive";

/// A live database connection
pub trait Connection: Send + 'static {
    /// Whether the connection still answers within `timeout`
    fn is_valid(&self, timeout: Duration) -> bool;

    /// Close the connection
    fn close(self) -> Result<(), BoxError>;
}

/// Opens new connections, typically wrapping a driver, URL and credentials
pub trait Connector<C>: Send + Sync + 'static {
    fn connect(&self) -> Result<C, BoxError>;
}

impl<C, F> Connector<C> for F
where
    F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
{
    fn connect(&self) -> Result<C, BoxError> {
        self()
    }
}

/// Pool settings for a data source
///
/// # Examples
///
/// ```
/// use partition_pool::DataSourceConfig;
/// use std::collections::HashMap;
/// use std::time::Duration;
///
/// let mut props = HashMap::new();
/// props.insert("maxActive".to_string(), "20".to_string());
///
/// let config = DataSourceConfig::from_props(&props).unwrap();
/// assert_eq!(config.max_active, 20);
/// assert_eq!(config.initial_size, 0);
/// assert_eq!(config.max_wait, Duration::from_millis(6000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Borrow timeout, also used as the validation timeout
    pub max_wait: Duration,

    /// Connections opened when the source is created
    pub initial_size: usize,

    /// Maximum open connections
    pub max_active: usize,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(6000),
            initial_size: 0,
            max_active: 8,
        }
    }
}

impl DataSourceConfig {
    /// Read `maxWait` (milliseconds), `initialSize` and `maxActive` from
    /// string properties, falling back to defaults for missing keys
    pub fn from_props(props: &HashMap<String, String>) -> PoolResult<Self> {
        let defaults = Self::default();
        let max_wait_ms = prop(props, KEY_MAX_WAIT, defaults.max_wait.as_millis() as u64)?;
        Ok(Self {
            max_wait: Duration::from_millis(max_wait_ms),
            initial_size: prop(props, KEY_INITIAL_SIZE, defaults.initial_size)?,
            max_active: prop(props, KEY_MAX_ACTIVE, defaults.max_active)?,
        })
    }

    /// Single-partition pool configuration for these settings
    pub fn pool_configuration(&self) -> PoolConfiguration {
        PoolConfiguration::new()
            .with_partition_count(1)
            .with_min_size(self.initial_size)
            .with_max_size(self.max_active)
            .with_max_wait(self.max_wait)
    }
}

fn prop<V>(props: &HashMap<String, String>, key: &str, default: V) -> PoolResult<V>
where
    V: FromStr,
    V::Err: Display,
{
    match props.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            PoolError::InvalidConfiguration(format!("{key} = {raw:?}: {e}"))
        }),
    }
}

struct ConnectionFactory<C, K> {
    connector: K,
    validation_timeout: Duration,
    _connection: PhantomData<fn() -> C>,
}

impl<C: Connection, K: Connector<C>> ObjectFactory<C> for ConnectionFactory<C, K> {
    fn create(&self) -> Result<C, BoxError> {
        self.connector.connect()
    }

    fn validate(&self, connection: &C) -> bool {
        connection.is_valid(self.validation_timeout)
    }

    fn destroy(&self, connection: C) -> Result<(), BoxError> {
        connection.close()
    }
}

/// Connection source backed by a single-partition pool
pub struct PooledDataSource<C: Connection> {
    pool: Pool<C>,
}

impl<C: Connection> PooledDataSource<C> {
    pub fn new<K>(connector: K, config: DataSourceConfig) -> PoolResult<Self>
    where
        K: Connector<C>,
    {
        let factory = ConnectionFactory {
            connector,
            validation_timeout: config.max_wait,
            _connection: PhantomData,
        };
        let pool = Pool::new(factory, config.pool_configuration())?;
        tracing::debug!(
            initial_size = config.initial_size,
            max_active = config.max_active,
            "data source ready"
        );
        Ok(Self { pool })
    }

    pub fn from_props<K>(connector: K, props: &HashMap<String, String>) -> PoolResult<Self>
    where
        K: Connector<C>,
    {
        Self::new(connector, DataSourceConfig::from_props(props)?)
    }

    /// Borrow a connection; it goes back to the pool when dropped
    pub fn get_connection(&self) -> PoolResult<PooledObject<C>> {
        self.pool.borrow()
    }

    /// Always fails: pooled connections share the source's credentials
    pub fn get_connection_as(&self, _username: &str, _password: &str) -> PoolResult<PooledObject<C>> {
        Err(PoolError::Unsupported(
            "pooled data source cannot open connections for other credentials",
        ))
    }

    pub fn return_connection(&self, connection: PooledObject<C>) -> PoolResult<()> {
        self.pool.return_object(connection)
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    /// Close the underlying pool; connections still out are closed on return
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeConnection {
        alive: Arc<AtomicBool>,
        closed: Arc<AtomicUsize>,
    }

    impl Connection for FakeConnection {
        fn is_valid(&self, _timeout: Duration) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn close(self) -> Result<(), BoxError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn source(
        props: &HashMap<String, String>,
    ) -> (PooledDataSource<FakeConnection>, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let alive = Arc::new(AtomicBool::new(true));
        let closed = Arc::new(AtomicUsize::new(0));
        let (a, c) = (Arc::clone(&alive), Arc::clone(&closed));
        let connector = move || -> Result<FakeConnection, BoxError> {
            Ok(FakeConnection {
                alive: Arc::clone(&a),
                closed: Arc::clone(&c),
            })
        };
        (PooledDataSource::from_props(connector, props).unwrap(), alive, closed)
    }

    #[test]
    fn test_props_defaults_and_overrides() {
        let config = DataSourceConfig::from_props(&HashMap::new()).unwrap();
        assert_eq!(config, DataSourceConfig::default());

        let mut props = HashMap::new();
        props.insert("maxWait".to_string(), " 250 ".to_string());
        props.insert("initialSize".to_string(), "2".to_string());
        let config = DataSourceConfig::from_props(&props).unwrap();
        assert_eq!(config.max_wait, Duration::from_millis(250));
        assert_eq!(config.initial_size, 2);

        let pool_config = config.pool_configuration();
        assert_eq!(pool_config.partition_count, 1);
        assert_eq!(pool_config.min_size, 2);
        assert_eq!(pool_config.max_size, 8);
    }

    #[test]
    fn test_unparsable_prop_is_rejected() {
        let mut props = HashMap::new();
        props.insert("maxActive".to_string(), "lots".to_string());
        assert!(matches!(
            DataSourceConfig::from_props(&props),
            Err(PoolError::InvalidConfiguration(msg)) if msg.contains("maxActive")
        ));
    }

    #[test]
    fn test_dead_connection_is_closed_and_replaced() {
        let mut props = HashMap::new();
        props.insert("initialSize".to_string(), "1".to_string());
        let (source, alive, closed) = source(&props);

        alive.store(false, Ordering::SeqCst);
        let conn = source.get_connection().unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        alive.store(true, Ordering::SeqCst);
        source.return_connection(conn).unwrap();
        assert_eq!(source.pool().idle_count(), 1);
    }

    #[test]
    fn test_other_credentials_unsupported() {
        let (source, _, _) = source(&HashMap::new());
        assert!(matches!(
            source.get_connection_as("admin", "secret"),
            Err(PoolError::Unsupported(_))
        ));
    }

    #[test]
    fn test_close_closes_idle_connections() {
        let mut props = HashMap::new();
        props.insert("initialSize".to_string(), "3".to_string());
        let (source, _, closed) = source(&props);

        source.close();
        assert_eq!(closed.load(Ordering::SeqCst), 3);
        assert!(matches!(source.get_connection(), Err(PoolError::Closed)));
    }
}
