use std::sync::Arc;

use tracing::{debug, info};

use crate::driver::{Connection, Driver, RawConnection};
use crate::errors::Result;
use crate::lifecycle::{BorrowedConnection, BorrowedRawConnection, Lease};

/// Picks the session each call runs on.
///
/// A borrowed session of the right kind is used when set, otherwise a new
/// session is opened from the driver and owned by the call.
#[derive(Debug)]
pub struct ConnectionProvider {
    driver: Arc<dyn Driver>,
    borrowed: Option<BorrowedConnection>,
    borrowed_raw: Option<BorrowedRawConnection>,
}

impl ConnectionProvider {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        ConnectionProvider {
            driver,
            borrowed: None,
            borrowed_raw: None,
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn borrowed(&self) -> Option<&BorrowedConnection> {
        self.borrowed.as_ref()
    }

    pub fn borrowed_raw(&self) -> Option<&BorrowedRawConnection> {
        self.borrowed_raw.as_ref()
    }

    pub fn set_borrowed(&mut self, conn: Option<BorrowedConnection>) -> Option<BorrowedConnection> {
        std::mem::replace(&mut self.borrowed, conn)
    }

    pub fn set_borrowed_raw(
        &mut self,
        conn: Option<BorrowedRawConnection>,
    ) -> Option<BorrowedRawConnection> {
        std::mem::replace(&mut self.borrowed_raw, conn)
    }

    pub(crate) async fn resolve(&self) -> Result<Lease<dyn Connection>> {
        match &self.borrowed {
            Some(conn) => {
                info!("Using a connection maintained outside of the engine");
                Ok(conn.lease().await)
            }
            None => {
                let conn = self.driver.connect().await?;
                debug!("opened connection");
                Ok(Lease::Owned(conn))
            }
        }
    }

    pub(crate) async fn resolve_raw(&self) -> Result<Lease<dyn RawConnection>> {
        match &self.borrowed_raw {
            Some(conn) => {
                info!("Using a raw connection maintained outside of the engine");
                Ok(conn.lease().await)
            }
            None => {
                let conn = self.driver.connect_raw().await?;
                debug!("opened raw connection");
                Ok(Lease::Owned(conn))
            }
        }
    }
}
