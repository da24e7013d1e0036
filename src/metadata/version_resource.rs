//! Version resource reader for portable executables.
//!
//! Only the parts of the image needed to reach `RT_VERSION` are read: the
//! headers, the section table and the section holding the resource
//! directory. Installers are often hundreds of megabytes of payload, so the
//! file is never read whole.

use crate::error::{Result, ScoutError};
use crate::metadata::{keys, PropertyMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const RT_VERSION: u32 = 16;
const RESOURCE_DIRECTORY_INDEX: usize = 2;
const FIXED_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const DEFAULT_TRANSLATION: &str = "040904b0";
const MAX_SECTION_BYTES: u32 = 64 * 1024 * 1024;

/// String properties copied out of the string table.
pub const STRING_KEYS: &[&str] = &[
    "CompanyName",
    "FileDescription",
    "InternalName",
    "LegalCopyright",
    "OriginalFilename",
    "ProductName",
];

/// Read the version resource of an executable into a property map.
///
/// The map always contains `FileVersion`, `ProductVersion` and every entry of
/// [`STRING_KEYS`]; values missing from the resource are empty strings.
pub fn read_version_info(path: &Path) -> Result<PropertyMap> {
    let fail = |message: &str| ScoutError::Metadata {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let mut file = File::open(path)?;
    let blob = read_version_blob(&mut file).map_err(|e| match e {
        VersionError::Io(err) => ScoutError::Io(err),
        VersionError::Format(msg) => fail(msg),
    })?;

    parse_version_info(&blob).ok_or_else(|| fail("malformed version resource"))
}

#[derive(Debug)]
enum VersionError {
    Io(std::io::Error),
    Format(&'static str),
}

impl From<std::io::Error> for VersionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => VersionError::Format("truncated image"),
            _ => VersionError::Io(err),
        }
    }
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let span = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && rva < self.virtual_address.saturating_add(span)
    }
}

/// Locate and return the raw `VS_VERSIONINFO` bytes.
fn read_version_blob<R: Read + Seek>(
    reader: &mut R,
) -> std::result::Result<Vec<u8>, VersionError> {
    let mut dos = [0u8; 64];
    reader.read_exact(&mut dos)?;
    if &dos[0..2] != b"MZ" {
        return Err(VersionError::Format("not a portable executable"));
    }
    let pe_offset = u32_at(&dos, 0x3C).ok_or(VersionError::Format("bad DOS header"))?;

    reader.seek(SeekFrom::Start(pe_offset as u64))?;
    let mut coff = [0u8; 24];
    reader.read_exact(&mut coff)?;
    if &coff[0..4] != b"PE\0\0" {
        return Err(VersionError::Format("missing PE signature"));
    }
    let section_count = u16_at(&coff, 6).unwrap_or(0) as usize;
    let optional_size = u16_at(&coff, 20).unwrap_or(0) as usize;

    let mut optional = vec![0u8; optional_size];
    reader.read_exact(&mut optional)?;
    let (count_offset, dirs_offset) = match u16_at(&optional, 0) {
        Some(0x10b) => (92, 96),
        Some(0x20b) => (108, 112),
        _ => return Err(VersionError::Format("unknown optional header")),
    };
    let dir_count = u32_at(&optional, count_offset).unwrap_or(0) as usize;
    if dir_count <= RESOURCE_DIRECTORY_INDEX {
        return Err(VersionError::Format("no resource directory"));
    }
    let entry = dirs_offset + RESOURCE_DIRECTORY_INDEX * 8;
    let resource_rva = u32_at(&optional, entry).unwrap_or(0);
    if resource_rva == 0 {
        return Err(VersionError::Format("no resources"));
    }

    let mut table = vec![0u8; section_count * 40];
    reader.read_exact(&mut table)?;
    let section = table
        .chunks_exact(40)
        .map(|h| Section {
            virtual_size: u32_at(h, 8).unwrap_or(0),
            virtual_address: u32_at(h, 12).unwrap_or(0),
            raw_size: u32_at(h, 16).unwrap_or(0),
            raw_pointer: u32_at(h, 20).unwrap_or(0),
        })
        .find(|s| s.contains(resource_rva))
        .ok_or(VersionError::Format("resource section not found"))?;

    if section.raw_size > MAX_SECTION_BYTES {
        return Err(VersionError::Format("resource section too large"));
    }
    reader.seek(SeekFrom::Start(section.raw_pointer as u64))?;
    let mut data = vec![0u8; section.raw_size as usize];
    reader.read_exact(&mut data)?;

    let root = (resource_rva - section.virtual_address) as usize;
    let (data_rva, size) =
        find_version_entry(&data, root).ok_or(VersionError::Format("no version resource"))?;
    let start = data_rva
        .checked_sub(section.virtual_address)
        .ok_or(VersionError::Format("version resource outside section"))?
        as usize;
    data.get(start..start + size as usize)
        .map(|b| b.to_vec())
        .ok_or(VersionError::Format("version resource outside section"))
}

/// Walk type → name → language to the first `RT_VERSION` data entry.
fn find_version_entry(data: &[u8], root: usize) -> Option<(u32, u32)> {
    let type_dir = directory_entries(data, root)?
        .into_iter()
        .find(|(id, _)| *id == RT_VERSION)
        .map(|(_, offset)| offset)?;
    let name_dir = first_subdirectory(data, root, type_dir)?;
    let lang_entry = first_entry(data, root, name_dir)?;
    if lang_entry & 0x8000_0000 != 0 {
        return None;
    }
    let entry = root + lang_entry as usize;
    Some((u32_at(data, entry)?, u32_at(data, entry + 4)?))
}

fn first_subdirectory(data: &[u8], root: usize, offset: u32) -> Option<u32> {
    if offset & 0x8000_0000 == 0 {
        return None;
    }
    first_entry(data, root, offset & 0x7FFF_FFFF)
        .filter(|o| o & 0x8000_0000 != 0)
        .map(|o| o & 0x7FFF_FFFF)
}

fn first_entry(data: &[u8], root: usize, dir_offset: u32) -> Option<u32> {
    directory_entries(data, root + (dir_offset & 0x7FFF_FFFF) as usize)?
        .first()
        .map(|(_, offset)| *offset)
}

/// `(name or id, offset)` pairs of one resource directory.
fn directory_entries(data: &[u8], at: usize) -> Option<Vec<(u32, u32)>> {
    let named = u16_at(data, at + 12)? as usize;
    let ids = u16_at(data, at + 14)? as usize;
    (0..named + ids)
        .map(|i| {
            let e = at + 16 + i * 8;
            Some((u32_at(data, e)?, u32_at(data, e + 4)?))
        })
        .collect()
}

/// One node of the `VS_VERSIONINFO` tree.
struct Node<'a> {
    key: String,
    value: &'a [u8],
    children: &'a [u8],
}

/// Parse a node starting at the beginning of `data`; returns it and its padded length.
fn parse_node(data: &[u8]) -> Option<(Node<'_>, usize)> {
    let length = u16_at(data, 0)? as usize;
    let value_length = u16_at(data, 2)? as usize;
    let value_type = u16_at(data, 4)?;
    if length < 6 || length > data.len() {
        return None;
    }
    let data = &data[..length];

    let (key, key_end) = utf16_z(data, 6)?;
    let value_start = align4(key_end);
    let value_bytes = if value_type == 1 {
        value_length * 2
    } else {
        value_length
    };
    let value_end = (value_start + value_bytes).min(length);
    let value = data.get(value_start.min(length)..value_end)?;
    let children_start = align4(value_end).min(length);

    Some((
        Node {
            key,
            value,
            children: &data[children_start..],
        },
        align4(length),
    ))
}

fn children(mut data: &[u8]) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    while data.len() >= 6 {
        match parse_node(data) {
            Some((node, consumed)) if consumed > 0 => {
                nodes.push(node);
                data = data.get(consumed..).unwrap_or(&[]);
            }
            _ => break,
        }
    }
    nodes
}

/// Decode a `VS_VERSIONINFO` blob.
pub(crate) fn parse_version_info(blob: &[u8]) -> Option<PropertyMap> {
    let (root, _) = parse_node(blob)?;
    if root.key != "VS_VERSION_INFO" {
        return None;
    }

    let mut props = PropertyMap::new();
    if root.value.len() >= 52 && u32_at(root.value, 0) == Some(FIXED_INFO_SIGNATURE) {
        props.insert(
            keys::FILE_VERSION.to_string(),
            quad(u32_at(root.value, 8)?, u32_at(root.value, 12)?),
        );
        props.insert(
            keys::PRODUCT_VERSION.to_string(),
            quad(u32_at(root.value, 16)?, u32_at(root.value, 20)?),
        );
    }

    let mut translation = None;
    let mut tables: Vec<(String, PropertyMap)> = Vec::new();
    for block in children(root.children) {
        match block.key.as_str() {
            "VarFileInfo" => {
                translation = children(block.children)
                    .into_iter()
                    .find(|var| var.key == "Translation")
                    .and_then(|var| {
                        let lang = u16_at(var.value, 0)?;
                        let codepage = u16_at(var.value, 2)?;
                        Some(format!("{lang:04x}{codepage:04x}"))
                    });
            }
            "StringFileInfo" => {
                for table in children(block.children) {
                    let strings = children(table.children)
                        .into_iter()
                        .map(|s| (s.key, utf16_text(s.value)))
                        .collect();
                    tables.push((table.key.to_lowercase(), strings));
                }
            }
            _ => {}
        }
    }

    let chosen = translation
        .as_deref()
        .and_then(|t| tables.iter().find(|(id, _)| id == t))
        .or_else(|| tables.iter().find(|(id, _)| id == DEFAULT_TRANSLATION))
        .map(|(_, strings)| strings);

    for key in STRING_KEYS {
        let value = chosen
            .and_then(|strings| strings.get(*key))
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        props.insert(key.to_string(), value);
    }
    props.entry(keys::FILE_VERSION.to_string()).or_default();
    props.entry(keys::PRODUCT_VERSION.to_string()).or_default();

    Some(props)
}

fn quad(ms: u32, ls: u32) -> String {
    format!("{}.{}.{}.{}", ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF)
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn u16_at(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn u32_at(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Null-terminated UTF-16 string at `at`; returns it and the offset past the terminator.
fn utf16_z(data: &[u8], at: usize) -> Option<(String, usize)> {
    let mut units = Vec::new();
    let mut pos = at;
    loop {
        let unit = u16_at(data, pos)?;
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Some((String::from_utf16_lossy(&units), pos))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|u| *u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
