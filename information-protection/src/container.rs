//! On-disk layout of labelled and protected content
//!
//! ```text
//! +--------+---------+-----------------+-------------------+------------+
//! | "IPCF" | version | header len (LE) | header (JSON)     | body       |
//! | 4 B    | 1 B     | u32             | header len bytes  | rest       |
//! +--------+---------+-----------------+-------------------+------------+
//! ```
//!
//! Anything that does not start with the magic is plain, unlabelled content.

use crate::protection::ProtectionDescriptor;
use chrono::{DateTime, Utc};
use crypto::WrappedKey;
use error_common::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"IPCF";
pub const FORMAT_VERSION: u8 = 1;
pub const PROTECTED_EXTENSION: &str = "pfile";

const PREAMBLE_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkingKind {
    Header,
    Footer,
    Watermark,
}

/// Visual marking applied to the content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarking {
    pub kind: MarkingKind,
    pub ui_element_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRecord {
    pub descriptor: ProtectionDescriptor,
    pub wrapped_key: WrappedKey,
    pub content_id: String,
    pub protected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHeader {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub markings: Vec<ContentMarking>,
    #[serde(default)]
    pub protection: Option<ProtectionRecord>,
    #[serde(default)]
    pub original_file_name: Option<String>,
}

impl ContainerHeader {
    /// No label data and no protection
    pub fn is_plain(&self) -> bool {
        self.metadata.is_empty() && self.markings.is_empty() && self.protection.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub header: ContainerHeader,
    /// Ciphertext when `header.protection` is set
    pub body: Vec<u8>,
}

impl Container {
    pub fn plain(body: Vec<u8>) -> Self {
        Self {
            header: ContainerHeader::default(),
            body,
        }
    }

    pub fn parse(bytes: &[u8]) -> SdkResult<Self> {
        if !bytes.starts_with(MAGIC) {
            return Ok(Self::plain(bytes.to_vec()));
        }

        let header_len = parse_preamble(bytes)?;
        let header_end = PREAMBLE_LEN
            .checked_add(header_len)
            .ok_or_else(|| truncated("header length overflows"))?;
        let header_bytes = bytes
            .get(PREAMBLE_LEN..header_end)
            .ok_or_else(|| truncated("header is shorter than declared"))?;
        let header: ContainerHeader = serde_json::from_slice(header_bytes)
            .map_err(|e| SdkError::bad_input(format!("Corrupt content header: {e}")))?;
        let body = bytes.get(header_end..).unwrap_or_default().to_vec();

        Ok(Self { header, body })
    }

    /// Reads only the header; `None` for plain content.
    pub fn read_header<R: Read>(reader: &mut R) -> SdkResult<Option<ContainerHeader>> {
        let mut preamble = [0u8; PREAMBLE_LEN];
        let mut filled = 0usize;
        while filled < PREAMBLE_LEN {
            let Some(rest) = preamble.get_mut(filled..) else {
                break;
            };
            let read = reader.read(rest)?;
            if read == 0 {
                break;
            }
            filled = filled.saturating_add(read);
        }

        let available = preamble.get(..filled).unwrap_or_default();
        if !available.starts_with(MAGIC) {
            return Ok(None);
        }
        let header_len = parse_preamble(available)?;

        // The declared length is untrusted; read at most that many bytes.
        let limit = u64::try_from(header_len).map_err(|_| truncated("header length overflows"))?;
        let mut header_bytes = Vec::new();
        reader.take(limit).read_to_end(&mut header_bytes)?;
        if header_bytes.len() != header_len {
            return Err(truncated("header is shorter than declared"));
        }
        let header = serde_json::from_slice(&header_bytes)
            .map_err(|e| SdkError::bad_input(format!("Corrupt content header: {e}")))?;
        Ok(Some(header))
    }

    pub fn read_header_from_path(path: &Path) -> SdkResult<Option<ContainerHeader>> {
        let mut file = std::fs::File::open(path)
            .map_err(|e| SdkError::from(e).with_context("path", path.display().to_string()))?;
        Self::read_header(&mut file)
    }

    /// Plain headers serialize to the bare body.
    pub fn to_bytes(&self) -> SdkResult<Vec<u8>> {
        if self.header.is_plain() {
            return Ok(self.body.clone());
        }

        let header = serde_json::to_vec(&self.header)
            .map_err(|e| SdkError::internal(format!("Failed to serialize content header: {e}")))?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| SdkError::bad_input("Content header exceeds 4 GiB"))?;

        let mut out = Vec::with_capacity(PREAMBLE_LEN.saturating_add(header.len()).saturating_add(self.body.len()));
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    pub fn is_protected(&self) -> bool {
        self.header.protection.is_some()
    }
}

fn parse_preamble(preamble: &[u8]) -> SdkResult<usize> {
    let Some((_, rest)) = preamble.split_first_chunk::<4>() else {
        return Err(truncated("missing magic"));
    };
    let Some((&version, rest)) = rest.split_first() else {
        return Err(truncated("missing format version"));
    };
    if version != FORMAT_VERSION {
        return Err(SdkError::not_supported(format!(
            "Content format version {version} is not supported"
        )));
    }
    let Some((len, _)) = rest.split_first_chunk::<4>() else {
        return Err(truncated("missing header length"));
    };
    usize::try_from(u32::from_le_bytes(*len)).map_err(|_| truncated("header length overflows"))
}

fn truncated(detail: &str) -> SdkError {
    SdkError::bad_input(format!("Truncated content container: {detail}"))
}

/// Adds or strips the protected-file suffix.
pub fn output_file_name(name: &str, protected: bool) -> String {
    let suffix = format!(".{PROTECTED_EXTENSION}");
    let has_suffix = name.len() > suffix.len() && name.to_ascii_lowercase().ends_with(&suffix);
    match (protected, has_suffix) {
        (true, false) => format!("{name}{suffix}"),
        (false, true) => name
            .get(..name.len().saturating_sub(suffix.len()))
            .unwrap_or(name)
            .to_string(),
        _ => name.to_string(),
    }
}
