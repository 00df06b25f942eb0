use crate::codec::DmAddress;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

/// Station flavour. NFC stations gate readiness on a second screen match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum DeviceClass {
    #[default]
    Standard,
    Nfc,
}

/// The four PLC registers a station owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddressSet {
    /// Status vector destination
    pub result: DmAddress,
    /// Scanner activity register
    pub scanner: DmAddress,
    /// Host writes its heartbeat echo here
    pub heartbeat_send: DmAddress,
    /// PLC toggles its heartbeat here
    pub heartbeat_recv: DmAddress,
}

impl DeviceAddressSet {
    pub fn new(result: &str, scanner: &str, heartbeat_send: &str, heartbeat_recv: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            result: result.parse()?,
            scanner: scanner.parse()?,
            heartbeat_send: heartbeat_send.parse()?,
            heartbeat_recv: heartbeat_recv.parse()?,
        })
    }
}

/// A registry entry resolved for one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub id: String,
    pub class: DeviceClass,
    pub addresses: DeviceAddressSet,
}

// id, result, scanner, heartbeat send, heartbeat recv
const BUILTIN: &[(&str, &str, &str, &str, &str)] = &[
    ("T1", "6501", "6001", "6510", "6010"),
    ("T2", "6601", "6101", "6610", "6110"),
    ("D1", "6701", "6201", "6710", "6210"),
    ("D2", "6801", "6301", "6810", "6310"),
    ("NFC", "6901", "6401", "6910", "6410"),
];

const NFC_ID: &str = "NFC";

/// Read-only map from station identifier to its registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceProfile>,
}

impl DeviceRegistry {
    /// The production station table.
    pub fn builtin() -> Self {
        let devices = BUILTIN
            .iter()
            .map(|&(id, result, scanner, hb_send, hb_recv)| {
                let addresses = DeviceAddressSet {
                    result: DmAddress::from_static(result),
                    scanner: DmAddress::from_static(scanner),
                    heartbeat_send: DmAddress::from_static(hb_send),
                    heartbeat_recv: DmAddress::from_static(hb_recv),
                };
                (id.to_string(), profile(id.to_string(), addresses))
            })
            .collect();
        Self { devices }
    }

    /// Build a registry from caller-supplied entries. Identifiers are
    /// normalised to upper case and must be unique.
    pub fn from_entries<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, DeviceAddressSet)>,
    {
        let mut devices = BTreeMap::new();
        for (id, addresses) in entries {
            let id = normalise(&id);
            if id.is_empty() {
                return Err(ConfigError::InvalidConfig("empty device identifier".to_string()));
            }
            if devices.insert(id.clone(), profile(id.clone(), addresses)).is_some() {
                return Err(ConfigError::DuplicateDevice(id));
            }
        }
        Ok(Self { devices })
    }

    pub fn lookup(&self, id: &str) -> Result<&DeviceProfile, ConfigError> {
        self.devices
            .get(&normalise(id))
            .ok_or_else(|| ConfigError::UnknownDevice(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.devices.values()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(id: String, addresses: DeviceAddressSet) -> DeviceProfile {
    let class = if id == NFC_ID {
        DeviceClass::Nfc
    } else {
        DeviceClass::Standard
    };
    DeviceProfile { id, class, addresses }
}

fn normalise(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}
