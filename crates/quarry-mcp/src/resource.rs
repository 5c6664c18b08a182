//! Resource addressing.
//!
//! Every table is exposed as one resource whose URI is
//! `<base>/<table>/schema`. The base is derived once from the database URL:
//! the password, query and fragment are dropped, the scheme becomes
//! `postgres`, and the last path segment (the database name) is replaced by
//! the table segment, so `postgres://app:pw@db:5432/shop` yields
//! `postgres://app@db:5432/orders/schema` for the `orders` table.

use crate::error::AddressError;
use crate::protocol::Resource;
use url::Url;

/// Final path segment of every resource URI.
pub const SCHEMA_PATH: &str = "schema";

/// MIME type of every resource.
pub const RESOURCE_MIME_TYPE: &str = "application/json";

/// Builds and parses resource URIs.
#[derive(Debug, Clone)]
pub struct ResourceBase {
    base: Url,
}

impl ResourceBase {
    /// Derive the resource base from the configured database URL.
    pub fn from_database_url(database_url: &str) -> Result<Self, AddressError> {
        let mut base = Url::parse(database_url)
            .map_err(|e| AddressError::InvalidDatabaseUrl(e.to_string()))?;

        base.set_scheme("postgres").map_err(|()| {
            AddressError::InvalidDatabaseUrl(format!(
                "cannot use scheme {:?} for resource URIs",
                base.scheme()
            ))
        })?;
        if base.password().is_some() {
            base.set_password(None).map_err(|()| {
                AddressError::InvalidDatabaseUrl("cannot strip password".to_string())
            })?;
        }
        base.set_query(None);
        base.set_fragment(None);
        if base.path().is_empty() {
            base.set_path("/");
        }
        base.path_segments_mut()
            .map_err(|()| AddressError::InvalidDatabaseUrl("URL has no hierarchical path".to_string()))?
            .pop();

        Ok(Self { base })
    }

    /// The base every resource URI starts with.
    pub fn as_url(&self) -> &Url {
        &self.base
    }

    /// Build the resource URI for a table.
    pub fn encode(&self, table_name: &str) -> Result<Url, AddressError> {
        let invalid = |reason| AddressError::InvalidResourceUri {
            uri: format!("{}{}/{}", self.base, table_name, SCHEMA_PATH),
            reason,
        };
        if table_name.is_empty() {
            return Err(invalid("table name is empty"));
        }
        if table_name.contains('/') {
            return Err(invalid("table names containing '/' are not supported"));
        }
        if table_name == "." || table_name == ".." {
            return Err(invalid("table name cannot be a dot segment"));
        }

        let mut uri = self.base.clone();
        uri.path_segments_mut()
            .map_err(|()| invalid("base URI has no hierarchical path"))?
            .push(table_name)
            .push(SCHEMA_PATH);
        Ok(uri)
    }

    /// Extract the table name from a resource URI.
    ///
    /// The authority is not checked against the base; only the shape of the
    /// path matters.
    pub fn decode(uri: &str) -> Result<String, AddressError> {
        let invalid = |reason| AddressError::InvalidResourceUri {
            uri: uri.to_string(),
            reason,
        };
        let url = Url::parse(uri).map_err(|_| invalid("not an absolute URI"))?;
        let mut segments = url
            .path_segments()
            .ok_or_else(|| invalid("URI has no hierarchical path"))?
            .rev();

        if segments.next() != Some(SCHEMA_PATH) {
            return Err(invalid("final path segment must be `schema`"));
        }
        let table = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| invalid("missing table name segment"))?;
        let table = urlencoding::decode(table).map_err(|_| invalid("table name is not valid UTF-8"))?;
        if table.contains('/') {
            return Err(invalid("table names containing '/' are not supported"));
        }

        Ok(table.into_owned())
    }

    /// The resource listed for a table.
    pub fn resource(&self, table_name: &str) -> Result<Resource, AddressError> {
        Ok(Resource {
            uri: self.encode(table_name)?.to_string(),
            mime_type: RESOURCE_MIME_TYPE.to_string(),
            name: format!("\"{table_name}\" database schema"),
        })
    }
}
