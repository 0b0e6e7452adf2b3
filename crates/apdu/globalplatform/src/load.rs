//! CAP/IJC executable load file reading
//!
//! CAP files are ZIP archives holding one `.cap` entry per component; IJC
//! files are the same component bytes concatenated already, with no
//! archive wrapper. Either way the LOAD command stream is built from the
//! same flat byte buffer, split into `block_size`-sized chunks.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::constants::DEFAULT_BLOCK_SIZE;
use crate::error::{Error, Result};

/// Component file names, in the fixed order they must be concatenated in.
/// A CAP archive need not contain all of them; missing ones are skipped
/// silently.
const CAP_COMPONENTS: &[&str] = &[
    "Header",
    "Directory",
    "Applet",
    "Import",
    "ConstantPool",
    "Class",
    "Method",
    "StaticField",
    "RefLocation",
    "Descriptor",
    "Debug",
];

/// Package and applet identity extracted from a load file's Header/Applet components
#[derive(Debug, Clone, Default)]
pub struct CapFileInfo {
    /// Package AID, from the Header component
    pub package_aid: Option<Vec<u8>>,
    /// Applet AIDs, from the Applet component, in declaration order
    pub applet_aids: Vec<Vec<u8>>,
    /// Per-applet `install_method_offset`, parallel to `applet_aids`.
    ///
    /// An offset into the Method component the card can use to locate an
    /// applet's install method; informational only, not validated or
    /// dereferenced here.
    pub applet_install_offsets: Vec<Option<u16>>,
}

/// A load file's concatenated component bytes, chunked into LOAD command blocks
#[derive(Debug, Clone)]
pub struct LoadCommandStream {
    data: Vec<u8>,
    block_size: usize,
    position: usize,
    current_block: usize,
}

impl LoadCommandStream {
    /// Build a stream from an already-concatenated or raw IJC byte buffer,
    /// using the default LOAD block size
    pub fn from_ijc_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::with_block_size(data.into(), DEFAULT_BLOCK_SIZE)
    }

    /// Build a stream from raw bytes with an explicit block size
    pub fn with_block_size(data: Vec<u8>, block_size: usize) -> Self {
        Self {
            data,
            block_size,
            position: 0,
            current_block: 0,
        }
    }

    /// Open a CAP (ZIP) archive at `path`, extract its components in the
    /// fixed order, and concatenate them into a single LOAD payload
    pub fn from_cap_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(|_| Error::CapFile("could not open cap file"))?;
        Self::from_cap_reader(file)
    }

    /// Same as [`Self::from_cap_file`], from an already-open reader
    pub fn from_cap_reader<R: Read + std::io::Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader).map_err(|_| Error::CapFile("invalid zip archive"))?;

        let mut entry_names = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            if let Ok(entry) = zip.by_index(i) {
                entry_names.push(entry.name().to_string());
            }
        }
        let find_component = |component: &str| -> Option<String> {
            let suffix = format!("/{component}.cap");
            entry_names
                .iter()
                .find(|name| name.ends_with(&suffix) || *name == &format!("{component}.cap"))
                .cloned()
        };

        let mut data = Vec::new();
        for component in CAP_COMPONENTS {
            let Some(entry_name) = find_component(component) else {
                continue;
            };
            let mut entry = zip
                .by_name(&entry_name)
                .map_err(|_| Error::CapFile("component entry vanished mid-read"))?;
            entry
                .read_to_end(&mut data)
                .map_err(|_| Error::CapFile("could not read component entry"))?;
        }

        Ok(Self::from_ijc_bytes(data))
    }

    /// The full concatenated payload, before chunking
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Parse package/applet identity out of the concatenated payload
    pub fn info(&self) -> Result<CapFileInfo> {
        parse_metadata(&self.data)
    }

    /// Total number of LOAD blocks this stream will emit
    pub const fn blocks_count(&self) -> usize {
        self.data.len().div_ceil(self.block_size.max(1))
    }

    /// Index of the next block [`Self::next_block`] will return, if any
    pub const fn current_block(&self) -> usize {
        self.current_block
    }

    /// `true` if there is at least one more block to emit
    pub fn has_next(&self) -> bool {
        self.position < self.data.len()
    }

    /// Advance and return the next `(is_last, block_num, block_data)`
    pub fn next_block(&mut self) -> Option<(bool, u8, &[u8])> {
        if !self.has_next() {
            return None;
        }
        let remaining = self.data.len() - self.position;
        let chunk = remaining.min(self.block_size);
        let is_last = remaining <= self.block_size;
        let block_num = self.current_block as u8;
        let slice = &self.data[self.position..self.position + chunk];

        self.position += chunk;
        self.current_block += 1;

        Some((is_last, block_num, slice))
    }
}

/// Parse `tag(1) || size(2 be) || data(size)` metadata blocks out of a
/// concatenated load file, extracting the Header (0x01) and Applet (0x03)
/// components.
fn parse_metadata(data: &[u8]) -> Result<CapFileInfo> {
    let mut info = CapFileInfo::default();
    let mut offset = 0;
    while offset + 3 <= data.len() {
        let tag = data[offset];
        let size = u16::from_be_bytes([data[offset + 1], data[offset + 2]]) as usize;
        let comp_start = offset + 3;
        let comp_end = comp_start
            .checked_add(size)
            .ok_or(Error::MalformedCap("component size overflow"))?;
        if comp_end > data.len() {
            return Err(Error::MalformedCap("declared component size exceeds remaining bytes"));
        }
        let comp_data = &data[comp_start..comp_end];
        offset = comp_end;

        match tag {
            0x01 => parse_header_component(comp_data, &mut info),
            0x03 => parse_applet_component(comp_data, &mut info),
            _ => {}
        }
    }
    Ok(info)
}

fn parse_header_component(comp_data: &[u8], info: &mut CapFileInfo) {
    // minor(1) major(1) flags(1) pkg_minor(1) pkg_major(1) aid_len(1) aid(n)
    const HEADER_PREFIX: usize = 5;
    if comp_data.len() < HEADER_PREFIX + 1 {
        return;
    }
    let aid_len = comp_data[HEADER_PREFIX] as usize;
    let aid_start = HEADER_PREFIX + 1;
    if let Some(aid) = comp_data.get(aid_start..aid_start + aid_len) {
        info.package_aid = Some(aid.to_vec());
    }
}

fn parse_applet_component(comp_data: &[u8], info: &mut CapFileInfo) {
    if comp_data.is_empty() {
        return;
    }
    let count = comp_data[0] as usize;
    let mut offset = 1;
    for _ in 0..count {
        let Some(&aid_len) = comp_data.get(offset) else {
            break;
        };
        let aid_len = aid_len as usize;
        offset += 1;
        let Some(aid) = comp_data.get(offset..offset + aid_len) else {
            break;
        };
        let Some(offset_bytes) = comp_data.get(offset + aid_len..offset + aid_len + 2) else {
            break;
        };
        info.applet_aids.push(aid.to_vec());
        info.applet_install_offsets
            .push(Some(u16::from_be_bytes([offset_bytes[0], offset_bytes[1]])));
        offset += aid_len + 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn header_component(package_aid: &[u8]) -> Vec<u8> {
        let mut comp = vec![0x02, 0x02, 0x00, 0x02, 0x00];
        comp.push(package_aid.len() as u8);
        comp.extend_from_slice(package_aid);
        let mut block = vec![0x01, 0, 0];
        block[1..3].copy_from_slice(&(comp.len() as u16).to_be_bytes());
        block.extend_from_slice(&comp);
        block
    }

    fn applet_component(aids: &[(&[u8], u16)]) -> Vec<u8> {
        let mut comp = vec![aids.len() as u8];
        for (aid, install_offset) in aids {
            comp.push(aid.len() as u8);
            comp.extend_from_slice(aid);
            comp.extend_from_slice(&install_offset.to_be_bytes());
        }
        let mut block = vec![0x03, 0, 0];
        block[1..3].copy_from_slice(&(comp.len() as u16).to_be_bytes());
        block.extend_from_slice(&comp);
        block
    }

    #[test]
    fn parses_package_aid_from_header() {
        let package_aid = hex!("A0000000620101");
        let data = header_component(&package_aid);
        let info = parse_metadata(&data).unwrap();
        assert_eq!(info.package_aid, Some(package_aid.to_vec()));
    }

    #[test]
    fn parses_applet_aids_and_install_offsets() {
        let aid_a = hex!("A000000062010101");
        let aid_b = hex!("A000000062010102");
        let data = applet_component(&[(&aid_a, 0x0010), (&aid_b, 0x0020)]);
        let info = parse_metadata(&data).unwrap();
        assert_eq!(info.applet_aids, vec![aid_a.to_vec(), aid_b.to_vec()]);
        assert_eq!(info.applet_install_offsets, vec![Some(0x0010), Some(0x0020)]);
    }

    #[test]
    fn concatenated_header_and_applet_both_parse() {
        let package_aid = hex!("A0000000620101");
        let applet_aid = hex!("A000000062010101");
        let mut data = header_component(&package_aid);
        data.extend_from_slice(&applet_component(&[(&applet_aid, 0x0000)]));
        let info = parse_metadata(&data).unwrap();
        assert_eq!(info.package_aid, Some(package_aid.to_vec()));
        assert_eq!(info.applet_aids, vec![applet_aid.to_vec()]);
    }

    #[test]
    fn unknown_tag_is_skipped_silently() {
        let mut data = vec![0x09, 0x00, 0x02, 0xAA, 0xBB];
        data.extend_from_slice(&header_component(&hex!("A0")));
        let info = parse_metadata(&data).unwrap();
        assert_eq!(info.package_aid, Some(hex!("A0").to_vec()));
    }

    #[test]
    fn truncated_block_header_errs() {
        assert!(matches!(
            parse_metadata(&[0x01, 0x00]),
            Err(Error::MalformedCap(_))
        ));
    }

    #[test]
    fn oversized_declared_length_errs() {
        assert!(matches!(
            parse_metadata(&[0x01, 0x00, 0xFF, 0xAA]),
            Err(Error::MalformedCap(_))
        ));
    }

    #[test]
    fn block_splitting_respects_block_size_and_flags_last() {
        let mut stream = LoadCommandStream::with_block_size(vec![0xAA; 10], 4);
        assert_eq!(stream.blocks_count(), 3);

        let (is_last, num, block) = stream.next_block().unwrap();
        assert!(!is_last);
        assert_eq!(num, 0);
        assert_eq!(block.len(), 4);

        let (is_last, num, block) = stream.next_block().unwrap();
        assert!(!is_last);
        assert_eq!(num, 1);
        assert_eq!(block.len(), 4);

        let (is_last, num, block) = stream.next_block().unwrap();
        assert!(is_last);
        assert_eq!(num, 2);
        assert_eq!(block.len(), 2);

        assert!(stream.next_block().is_none());
        assert!(!stream.has_next());
    }

    #[test]
    fn single_block_under_block_size_is_last() {
        let mut stream = LoadCommandStream::from_ijc_bytes(vec![0x01, 0x02, 0x03]);
        let (is_last, num, block) = stream.next_block().unwrap();
        assert!(is_last);
        assert_eq!(num, 0);
        assert_eq!(block, &[0x01, 0x02, 0x03]);
    }
}
