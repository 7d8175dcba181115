//! Sensor provisioning for `relay-node mksensor`.

use sensor_gateway::{CredentialError, SensorCredentials};
use serde::Serialize;
use shared_types::Sensor;

/// A freshly minted sensor and the token it presents at admission.
#[derive(Debug, Clone)]
pub struct ProvisionedSensor {
    pub sensor: Sensor,
    pub token: String,
}

#[derive(Serialize)]
struct SensorsSection<'a> {
    sensors: [&'a Sensor; 1],
}

impl ProvisionedSensor {
    /// Mint credentials for a new sensor.
    pub fn mint(name: &str, location: &str) -> Result<Self, CredentialError> {
        let credentials = SensorCredentials::generate();
        let token = credentials.signed_token()?;
        Ok(Self {
            sensor: Sensor {
                id: credentials.sensor_id,
                name: name.to_string(),
                location: location.to_string(),
                secret: credentials.secret,
            },
            token,
        })
    }

    /// `[[sensors]]` entry to append to the relay configuration.
    pub fn config_entry(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(&SensorsSection {
            sensors: [&self.sensor],
        })
    }
}
