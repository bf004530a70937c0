//! Command Catalog
//!
//! The ONLY diagnostic operations netdoc knows about. Everything downstream
//! (relevance matching, validation, prompting) resolves names against this
//! registry.
//!
//! - Built-in list compiled into the binary
//! - Optional JSON knowledge base file overriding it
//! - A broken knowledge base never leaves the catalog empty: the built-in
//!   list takes over and the failure is reported
//! - Entries are immutable apart from the lazily attached embedding

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Catalog Entry
// ============================================================================

/// A single approved diagnostic operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(alias = "cmdlet")]
    name: String,
    description: String,
    #[serde(default, alias = "parameters")]
    options: Vec<String>,
    #[serde(skip)]
    embedding: Option<Vec<f32>>,
}

impl CatalogEntry {
    pub fn new(name: &str, description: &str, options: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            embedding: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Option names are matched exactly, the way they are listed
    pub fn accepts_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Text sent to the embedding backend for this entry
    pub fn embedding_text(&self) -> String {
        format!(
            "{}: {} Parameters: {}",
            self.name,
            self.description,
            self.options.join(", ")
        )
    }
}

// ============================================================================
// Catalog Source
// ============================================================================

/// Where the catalog comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    BuiltIn,
    File(PathBuf),
}

impl CatalogSource {
    pub fn from_optional_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => CatalogSource::File(p.to_path_buf()),
            None => CatalogSource::BuiltIn,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Registry of known diagnostic operations, in registration order
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load from a source, falling back to the built-in list.
    ///
    /// The error that forced the fallback (if any) is returned alongside the
    /// catalog so callers can surface it.
    pub fn load(source: &CatalogSource) -> (Self, Option<CatalogError>) {
        match source {
            CatalogSource::BuiltIn => (Self::builtin(), None),
            CatalogSource::File(path) => match Self::from_file(path) {
                Ok(catalog) => {
                    info!(
                        path = %path.display(),
                        commands = catalog.len(),
                        "Loaded knowledge base"
                    );
                    (catalog, None)
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Error loading knowledge base, using built-in catalog"
                    );
                    (Self::builtin(), Some(e))
                }
            },
        }
    }

    /// Read a JSON knowledge base file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a JSON array of `{name, description, options}` records
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(json).map_err(|e| CatalogError::Malformed(e.to_string()))?;
        Self::from_entries(entries)
    }

    /// Build from entries, enforcing non-empty and unique names.
    /// Names are stored trimmed.
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for entry in &mut entries {
            let name = entry.name.trim().to_string();
            if name.is_empty() || name.split_whitespace().count() != 1 {
                return Err(CatalogError::Malformed(format!(
                    "invalid command name '{}'",
                    entry.name
                )));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(CatalogError::Duplicate(name));
            }
            entry.name = name;
        }

        Ok(Self { entries })
    }

    /// Built-in network diagnostic commands
    pub fn builtin() -> Self {
        let entries = vec![
            CatalogEntry::new(
                "Get-NetIPAddress",
                "Gets the IP address configuration (IPv4 and IPv6) and associated interfaces.",
                &["InterfaceAlias", "InterfaceIndex", "AddressFamily"],
            ),
            CatalogEntry::new(
                "Get-NetIPConfiguration",
                "Displays IP configuration details including DNS servers, gateways and adapter info.",
                &["InterfaceAlias", "Detailed"],
            ),
            CatalogEntry::new(
                "Get-NetAdapter",
                "Shows the network adapter's name, status, MAC address, link speed and related info.",
                &["Name", "InterfaceDescription"],
            ),
            CatalogEntry::new(
                "Enable-NetAdapter",
                "Enables (brings up) a network adapter.",
                &["Name"],
            ),
            CatalogEntry::new(
                "Disable-NetAdapter",
                "Disables (brings down) a network adapter.",
                &["Name"],
            ),
            CatalogEntry::new(
                "Get-NetRoute",
                "Lists entries from the IP routing table (destination prefixes, next hops, metrics).",
                &["InterfaceIndex", "DestinationPrefix", "NextHop"],
            ),
            CatalogEntry::new(
                "Test-Connection",
                "Performs an ICMP \"ping\" test to one or more remote hosts.",
                &["TargetName", "Count", "Delay", "MaxHops", "BufferSize"],
            ),
            CatalogEntry::new(
                "Test-NetConnection",
                "Tests connectivity over TCP, DNS resolution, traceroute diagnostics.",
                &["ComputerName", "Port", "TraceRoute"],
            ),
            CatalogEntry::new(
                "Get-NetTCPConnection",
                "Retrieves active TCP connections (local/remote addresses, ports, state).",
                &["LocalPort", "RemoteAddress", "State"],
            ),
            CatalogEntry::new(
                "Resolve-DnsName",
                "Resolves DNS names to IP addresses (nslookup-like functionality).",
                &["Server"],
            ),
            CatalogEntry::new(
                "Get-DnsClient",
                "Displays the status of the local DNS client (by network interface).",
                &["InterfaceAlias", "InterfaceIndex"],
            ),
            CatalogEntry::new("Get-DnsClientCache", "Shows the DNS resolver cache.", &[]),
            CatalogEntry::new(
                "Clear-DnsClientCache",
                "Clears the local DNS resolver cache.",
                &[],
            ),
            CatalogEntry::new(
                "Get-DnsClientServerAddress",
                "Lists configured DNS server addresses per interface.",
                &["InterfaceAlias"],
            ),
            CatalogEntry::new(
                "Get-Service",
                "Checks status of specified Windows service(s).",
                &["Name", "DisplayName"],
            ),
            CatalogEntry::new(
                "Restart-Service",
                "Restarts the specified Windows service.",
                &["Name"],
            ),
        ];

        Self { entries }
    }

    /// Write the catalog as JSON (embeddings are not persisted)
    pub fn save_to_file(&self, path: &Path) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CatalogError::Malformed(e.to_string()))?;

        let write_err = |source: std::io::Error| CatalogError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        fs::write(path, json).map_err(write_err)
    }

    /// Case-insensitive exact match on the command name
    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Attach an embedding to one entry. Returns false for unknown names.
    pub fn attach_embedding(&mut self, name: &str, vector: Vec<f32>) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
        {
            Some(entry) => {
                entry.embedding = Some(vector);
                true
            }
            None => false,
        }
    }

    /// True once any entry carries an embedding
    pub fn has_embeddings(&self) -> bool {
        self.entries.iter().any(|e| e.embedding.is_some())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
