//! detached signatures for the published summary and index

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// produces a detached signature over a buffer
pub trait Signer {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// contents of a `.sig` file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedSignatures {
    #[serde(rename = "ostree.gpgsigs")]
    pub gpgsigs: Vec<Vec<u8>>,
}

impl DetachedSignatures {
    /// sign `data` and wrap the result
    pub fn create(signer: &dyn Signer, data: &[u8]) -> Result<Self> {
        Ok(Self {
            gpgsigs: vec![signer.sign(data)?],
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cbor = Vec::new();
        ciborium::into_writer(self, &mut cbor)?;
        Ok(cbor)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

/// signs by running `gpg --detach-sign`
#[derive(Clone, Debug)]
pub struct GpgSigner {
    key_ids: Vec<String>,
    homedir: Option<PathBuf>,
    program: String,
}

impl GpgSigner {
    pub fn new(key_ids: Vec<String>, homedir: Option<PathBuf>) -> Self {
        Self {
            key_ids,
            homedir,
            program: "gpg".to_string(),
        }
    }

    /// use another gpg-compatible binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch").arg("--no-tty");
        if let Some(homedir) = &self.homedir {
            cmd.arg("--homedir").arg(homedir);
        }
        for key in &self.key_ids {
            cmd.arg("--local-user").arg(key);
        }
        cmd.arg("--detach-sign").arg("--output").arg("-");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Signer for GpgSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.key_ids.is_empty() {
            return Err(Error::Signing("no signing keys given".to_string()));
        }

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| Error::Signing(format!("failed to run {}: {}", self.program, e)))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Signing("no stdin for gpg".to_string()))?;

        // stdin must be written while stdout is drained
        let (written, output) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(data));
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output =
            output.map_err(|e| Error::Signing(format!("failed to wait for gpg: {}", e)))?;
        if !output.status.success() {
            return Err(Error::Signing(format!(
                "gpg failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Signing(format!("writing to gpg: {}", e))),
            Err(_) => return Err(Error::Signing("gpg writer thread panicked".to_string())),
        }

        tracing::debug!("signed {} bytes with {:?}", data.len(), self.key_ids);
        Ok(output.stdout)
    }
}
