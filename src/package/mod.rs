//! Executable archive packaging

pub mod app;
pub mod layout;
pub mod manifest;
pub mod packager;
pub mod pod;
pub mod writer;

pub use app::{AppDescriptor, ProjectInfo};
pub use layout::Layout;
pub use manifest::Manifest;
pub use packager::{PackageReport, Packager, Repackager};
pub use pod::{EntryMarker, PodClassifier, PodEntry, PodPlan, PodRole};
pub use writer::ArchiveWriter;

#[cfg(test)]
pub(crate) mod testing {
    //! Archive fixtures shared by the packaging, scanning and launch tests

    const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";

    /// Overwrite the local header signature of `name`, leaving the central
    /// directory intact so the archive still opens
    pub fn break_local_header(bytes: &mut [u8], name: &str) {
        let offset = (0..bytes.len().saturating_sub(30))
            .find(|&at| {
                if &bytes[at..at + 4] != LOCAL_HEADER_SIGNATURE {
                    return false;
                }
                let name_len = u16::from_le_bytes([bytes[at + 26], bytes[at + 27]]) as usize;
                bytes.get(at + 30..at + 30 + name_len) == Some(name.as_bytes())
            })
            .unwrap_or_else(|| panic!("no local header for {}", name));
        bytes[offset..offset + 4].copy_from_slice(b"XXXX");
    }

    /// Rewrite the uncompressed size the central directory declares for `name`
    pub fn declare_size(bytes: &mut [u8], name: &str, size: u32) {
        let offset = (0..bytes.len().saturating_sub(46))
            .find(|&at| {
                if &bytes[at..at + 4] != b"PK\x01\x02" {
                    return false;
                }
                let name_len = u16::from_le_bytes([bytes[at + 28], bytes[at + 29]]) as usize;
                bytes.get(at + 46..at + 46 + name_len) == Some(name.as_bytes())
            })
            .unwrap_or_else(|| panic!("no central directory entry for {}", name));
        bytes[offset + 24..offset + 28].copy_from_slice(&size.to_le_bytes());
    }
}
