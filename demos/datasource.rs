//! Pooled data source example with a stand-in connection type

use partition_pool::{BoxError, Connection, PooledDataSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct EchoConnection {
    session: usize,
}

impl EchoConnection {
    fn query(&self, sql: &str) -> String {
        format!("session {} ran: {}", self.session, sql)
    }
}

impl Connection for EchoConnection {
    fn is_valid(&self, _timeout: Duration) -> bool {
        true
    }

    fn close(self) -> Result<(), BoxError> {
        println!("   Closing session {}", self.session);
        Ok(())
    }
}

fn main() {
    println!("=== Partition Pool - Data Source ===\n");

    let mut props = HashMap::new();
    props.insert("initialSize".to_string(), "2".to_string());
    props.insert("maxActive".to_string(), "4".to_string());
    props.insert("maxWait".to_string(), "500".to_string());

    let sessions = AtomicUsize::new(1);
    let connector = move || -> Result<EchoConnection, BoxError> {
        Ok(EchoConnection {
            session: sessions.fetch_add(1, Ordering::Relaxed),
        })
    };

    let source = PooledDataSource::from_props(connector, &props).unwrap();

    {
        let conn = source.get_connection().unwrap();
        println!("   {}", conn.query("SELECT 1"));
    }

    if let Err(e) = source.get_connection_as("admin", "secret") {
        println!("   get_connection_as: {}", e);
    }

    source.close();
}
