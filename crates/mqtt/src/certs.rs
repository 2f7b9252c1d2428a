use std::fs;
use std::path::Path;

use rumqttc::TlsConfiguration;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// PEM material for mutual-auth TLS, loaded once at startup.
///
/// The broker requires TLS 1.2 client certificates; a gateway that cannot
/// read its credentials has nothing useful to do, so loading failures are
/// surfaced immediately instead of at first publish.
#[derive(Clone)]
pub struct CertificateBundle {
    ca: Vec<u8>,
    client_cert: Vec<u8>,
    client_key: Vec<u8>,
}

impl CertificateBundle {
    pub fn load(config: &MqttConfig) -> Result<Self, MqttError> {
        Ok(Self {
            ca: read_pem(&config.ca_path)?,
            client_cert: read_pem(&config.cert_path)?,
            client_key: read_pem(&config.key_path)?,
        })
    }

    pub(crate) fn tls_configuration(&self) -> TlsConfiguration {
        TlsConfiguration::Simple {
            ca: self.ca.clone(),
            alpn: None,
            client_auth: Some((self.client_cert.clone(), self.client_key.clone())),
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, MqttError> {
    fs::read(path).map_err(|source| MqttError::Certificate {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(label: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN {label}-----").unwrap();
        writeln!(file, "dGVzdA==").unwrap();
        writeln!(file, "-----END {label}-----").unwrap();
        file
    }

    #[test]
    fn loads_all_three_files() {
        let ca = pem_file("CERTIFICATE");
        let cert = pem_file("CERTIFICATE");
        let key = pem_file("PRIVATE KEY");
        let cfg = MqttConfig {
            ca_path: ca.path().to_path_buf(),
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
            ..MqttConfig::default()
        };
        assert!(CertificateBundle::load(&cfg).is_ok());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let cfg = MqttConfig {
            ca_path: "/nonexistent/root-ca.pem".into(),
            ..MqttConfig::default()
        };
        match CertificateBundle::load(&cfg) {
            Err(MqttError::Certificate { path, .. }) => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/root-ca.pem"));
            }
            other => panic!("expected certificate error, got {:?}", other.map(|_| ())),
        }
    }
}
