// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parser, serializer and text renderer for UEFI device paths.
//!
//! A device path is a flat sequence of length-prefixed nodes, each tagged
//! with a (type, subtype) pair. Nodes this crate does not understand are kept
//! as opaque bodies, so a parsed list always re-encodes to the exact bytes it
//! came from.

use crate::reader::ByteReader;
use crate::ParseError;
use efivar_specs::boot::AcpiDevice;
use efivar_specs::boot::AcpiDeviceSubType;
use efivar_specs::boot::BiosBootDeviceSubType;
use efivar_specs::boot::BiosBootSpecDevice;
use efivar_specs::boot::CdromDevice;
use efivar_specs::boot::DevicePathHeader;
use efivar_specs::boot::DeviceType;
use efivar_specs::boot::EndDeviceSubType;
use efivar_specs::boot::HardDriveDevice;
use efivar_specs::boot::HardwareDeviceSubType;
use efivar_specs::boot::MediaDeviceSubType;
use efivar_specs::boot::MessagingDeviceSubType;
use efivar_specs::boot::PartitionFormat;
use efivar_specs::boot::PciDevice;
use guid::Guid;
use std::ffi::CString;
use ucs2::Ucs2Str;
use ucs2::Ucs2String;
use zerocopy::IntoBytes;

#[derive(Debug, Clone, PartialEq)]
pub enum HardwarePath {
    Pci(PciDevice),
    Unknown {
        sub_type: HardwareDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcpiPath {
    /// The compressed HID/UID form. The HID renders back to its seven
    /// character EISA form: three letters packed five bits each in the low
    /// half, device as four hex digits in the high half.
    Acpi(AcpiDevice),
    Unknown {
        sub_type: AcpiDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagingPath {
    Unknown {
        sub_type: MessagingDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaPath {
    HardDrive(HardDriveDevice),
    Cdrom(CdromDevice),
    Vendor {
        vendor_guid: Guid,
        data: Vec<u8>,
    },
    /// Null-terminated UCS-2 path of a file on the preceding partition.
    FilePath(Ucs2String),
    Unknown {
        sub_type: MediaDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BiosBootPath {
    BiosBootSpec {
        device: BiosBootSpecDevice,
        /// Null-terminated ASCII.
        description: CString,
    },
    Unknown {
        sub_type: BiosBootDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndPath {
    /// Terminates one instance; another follows.
    Instance,
    /// Terminates the whole list.
    Entire,
    Unknown {
        sub_type: EndDeviceSubType,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DevicePathNode {
    Hardware(HardwarePath),
    Acpi(AcpiPath),
    Messaging(MessagingPath),
    Media(MediaPath),
    BiosBoot(BiosBootPath),
    End(EndPath),
    Unknown {
        device_type: DeviceType,
        sub_type: u8,
        data: Vec<u8>,
    },
}

impl DevicePathNode {
    fn parse_body(
        device_type: DeviceType,
        sub_type: u8,
        body: &[u8],
        base: usize,
    ) -> Result<Self, ParseError> {
        Ok(match device_type {
            DeviceType::HARDWARE => {
                DevicePathNode::Hardware(match HardwareDeviceSubType(sub_type) {
                    HardwareDeviceSubType::PCI => {
                        HardwarePath::Pci(read_exact::<PciDevice>(body, base)?)
                    }
                    sub_type => HardwarePath::Unknown {
                        sub_type,
                        data: body.to_vec(),
                    },
                })
            }
            DeviceType::ACPI => DevicePathNode::Acpi(match AcpiDeviceSubType(sub_type) {
                AcpiDeviceSubType::ACPI => AcpiPath::Acpi(read_exact::<AcpiDevice>(body, base)?),
                sub_type => AcpiPath::Unknown {
                    sub_type,
                    data: body.to_vec(),
                },
            }),
            DeviceType::MESSAGING => DevicePathNode::Messaging(MessagingPath::Unknown {
                sub_type: MessagingDeviceSubType(sub_type),
                data: body.to_vec(),
            }),
            DeviceType::MEDIA => DevicePathNode::Media(match MediaDeviceSubType(sub_type) {
                MediaDeviceSubType::HARD_DRIVE => {
                    MediaPath::HardDrive(read_exact::<HardDriveDevice>(body, base)?)
                }
                MediaDeviceSubType::CD_ROM => {
                    MediaPath::Cdrom(read_exact::<CdromDevice>(body, base)?)
                }
                MediaDeviceSubType::VENDOR => {
                    let mut r = ByteReader::at(body, base);
                    let vendor_guid: Guid = r.read()?;
                    MediaPath::Vendor {
                        vendor_guid,
                        data: r.rest().to_vec(),
                    }
                }
                MediaDeviceSubType::FILE => {
                    let name = Ucs2Str::parse_prefix(body).map_err(ParseError::InvalidUcs2)?;
                    if name.as_bytes().len() != body.len() {
                        return Err(ParseError::TrailingData);
                    }
                    MediaPath::FilePath(name.to_ucs2_string())
                }
                sub_type => MediaPath::Unknown {
                    sub_type,
                    data: body.to_vec(),
                },
            }),
            DeviceType::BIOS_BOOT_SPEC => {
                DevicePathNode::BiosBoot(match BiosBootDeviceSubType(sub_type) {
                    BiosBootDeviceSubType::BIOS_BOOT_SPEC => {
                        let mut r = ByteReader::at(body, base);
                        let device: BiosBootSpecDevice = r.read()?;
                        let description = r.read_ascii_nul()?;
                        if !r.is_empty() {
                            return Err(ParseError::TrailingData);
                        }
                        BiosBootPath::BiosBootSpec {
                            device,
                            // The scan stops at the first null, so the bytes
                            // hold exactly one terminator.
                            description: CString::from_vec_with_nul(description.to_vec()).unwrap(),
                        }
                    }
                    sub_type => BiosBootPath::Unknown {
                        sub_type,
                        data: body.to_vec(),
                    },
                })
            }
            DeviceType::END => DevicePathNode::End(match EndDeviceSubType(sub_type) {
                EndDeviceSubType::INSTANCE => EndPath::Instance,
                EndDeviceSubType::ENTIRE => EndPath::Entire,
                sub_type => EndPath::Unknown {
                    sub_type,
                    data: body.to_vec(),
                },
            }),
            device_type => DevicePathNode::Unknown {
                device_type,
                sub_type,
                data: body.to_vec(),
            },
        })
    }

    fn discriminator(&self) -> (DeviceType, u8) {
        match self {
            DevicePathNode::Hardware(p) => (
                DeviceType::HARDWARE,
                match p {
                    HardwarePath::Pci(_) => HardwareDeviceSubType::PCI.0,
                    HardwarePath::Unknown { sub_type, .. } => sub_type.0,
                },
            ),
            DevicePathNode::Acpi(p) => (
                DeviceType::ACPI,
                match p {
                    AcpiPath::Acpi(_) => AcpiDeviceSubType::ACPI.0,
                    AcpiPath::Unknown { sub_type, .. } => sub_type.0,
                },
            ),
            DevicePathNode::Messaging(MessagingPath::Unknown { sub_type, .. }) => {
                (DeviceType::MESSAGING, sub_type.0)
            }
            DevicePathNode::Media(p) => (
                DeviceType::MEDIA,
                match p {
                    MediaPath::HardDrive(_) => MediaDeviceSubType::HARD_DRIVE.0,
                    MediaPath::Cdrom(_) => MediaDeviceSubType::CD_ROM.0,
                    MediaPath::Vendor { .. } => MediaDeviceSubType::VENDOR.0,
                    MediaPath::FilePath(_) => MediaDeviceSubType::FILE.0,
                    MediaPath::Unknown { sub_type, .. } => sub_type.0,
                },
            ),
            DevicePathNode::BiosBoot(p) => (
                DeviceType::BIOS_BOOT_SPEC,
                match p {
                    BiosBootPath::BiosBootSpec { .. } => BiosBootDeviceSubType::BIOS_BOOT_SPEC.0,
                    BiosBootPath::Unknown { sub_type, .. } => sub_type.0,
                },
            ),
            DevicePathNode::End(p) => (
                DeviceType::END,
                match p {
                    EndPath::Instance => EndDeviceSubType::INSTANCE.0,
                    EndPath::Entire => EndDeviceSubType::ENTIRE.0,
                    EndPath::Unknown { sub_type, .. } => sub_type.0,
                },
            ),
            DevicePathNode::Unknown {
                device_type,
                sub_type,
                ..
            } => (*device_type, *sub_type),
        }
    }

    fn body_bytes(&self) -> Vec<u8> {
        match self {
            DevicePathNode::Hardware(p) => match p {
                HardwarePath::Pci(dev) => dev.as_bytes().to_vec(),
                HardwarePath::Unknown { data, .. } => data.clone(),
            },
            DevicePathNode::Acpi(p) => match p {
                AcpiPath::Acpi(dev) => dev.as_bytes().to_vec(),
                AcpiPath::Unknown { data, .. } => data.clone(),
            },
            DevicePathNode::Messaging(MessagingPath::Unknown { data, .. }) => data.clone(),
            DevicePathNode::Media(p) => match p {
                MediaPath::HardDrive(dev) => dev.as_bytes().to_vec(),
                MediaPath::Cdrom(dev) => dev.as_bytes().to_vec(),
                MediaPath::Vendor { vendor_guid, data } => {
                    let mut out = vendor_guid.as_bytes().to_vec();
                    out.extend_from_slice(data);
                    out
                }
                MediaPath::FilePath(name) => name.as_bytes().to_vec(),
                MediaPath::Unknown { data, .. } => data.clone(),
            },
            DevicePathNode::BiosBoot(p) => match p {
                BiosBootPath::BiosBootSpec {
                    device,
                    description,
                } => {
                    let mut out = device.as_bytes().to_vec();
                    out.extend_from_slice(description.as_bytes_with_nul());
                    out
                }
                BiosBootPath::Unknown { data, .. } => data.clone(),
            },
            DevicePathNode::End(p) => match p {
                EndPath::Instance | EndPath::Entire => Vec::new(),
                EndPath::Unknown { data, .. } => data.clone(),
            },
            DevicePathNode::Unknown { data, .. } => data.clone(),
        }
    }

    /// Serializes this node, header included.
    pub fn write_into(&self, out: &mut Vec<u8>) {
        let (device_type, sub_type) = self.discriminator();
        let body = self.body_bytes();
        let header = DevicePathHeader {
            device_type,
            sub_type,
            length: ((body.len() + size_of::<DevicePathHeader>()) as u16).to_le_bytes(),
        };
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
    }

    /// Text representation of this node, `None` for end markers.
    pub fn text(&self) -> Option<String> {
        Some(match self {
            DevicePathNode::Hardware(p) => match p {
                HardwarePath::Pci(dev) => format!("Pci({},{})", dev.function, dev.device),
                HardwarePath::Unknown { sub_type, data } => {
                    opaque_text(DeviceType::HARDWARE.0, sub_type.0, data)
                }
            },
            DevicePathNode::Acpi(p) => match p {
                AcpiPath::Acpi(dev) => {
                    let (hid, uid) = (dev.hid, dev.uid);
                    format!("ACPI({},{})", eisa_id(hid), uid)
                }
                AcpiPath::Unknown { sub_type, data } => {
                    opaque_text(DeviceType::ACPI.0, sub_type.0, data)
                }
            },
            DevicePathNode::Messaging(MessagingPath::Unknown { sub_type, data }) => {
                opaque_text(DeviceType::MESSAGING.0, sub_type.0, data)
            }
            DevicePathNode::Media(p) => match p {
                MediaPath::HardDrive(dev) => hard_drive_text(dev),
                MediaPath::Cdrom(dev) => {
                    let (entry, start, size) =
                        (dev.boot_entry, dev.partition_start, dev.partition_size);
                    format!("CDROM({entry},{start:x},{size:x})")
                }
                MediaPath::Vendor { vendor_guid, data } => {
                    format!("VenMedia({vendor_guid},{})", hex_upper(data))
                }
                MediaPath::FilePath(name) => format!("File({name})"),
                MediaPath::Unknown { sub_type, data } => {
                    opaque_text(DeviceType::MEDIA.0, sub_type.0, data)
                }
            },
            DevicePathNode::BiosBoot(p) => match p {
                BiosBootPath::BiosBootSpec {
                    device,
                    description,
                } => {
                    let (device_type, status) = (device.device_type, device.status_flag);
                    format!(
                        "BBS({device_type},\"{}\",{status:x})",
                        description.to_string_lossy()
                    )
                }
                BiosBootPath::Unknown { sub_type, data } => {
                    opaque_text(DeviceType::BIOS_BOOT_SPEC.0, sub_type.0, data)
                }
            },
            DevicePathNode::End(_) => return None,
            DevicePathNode::Unknown {
                device_type,
                sub_type,
                data,
            } => opaque_text(device_type.0, *sub_type, data),
        })
    }
}

fn read_exact<T: zerocopy::FromBytes>(body: &[u8], base: usize) -> Result<T, ParseError> {
    let mut r = ByteReader::at(body, base);
    let value = r.read::<T>()?;
    if !r.is_empty() {
        return Err(ParseError::TrailingData);
    }
    Ok(value)
}

fn opaque_text(device_type: u8, sub_type: u8, data: &[u8]) -> String {
    format!("Path({device_type},{sub_type},{})", hex_upper(data))
}

fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

fn hard_drive_text(dev: &HardDriveDevice) -> String {
    let (number, start, size) = (
        dev.partition_number,
        dev.partition_start,
        dev.partition_size,
    );

    let (format_name, signature) = match dev.partition_format {
        PartitionFormat::MBR => (
            "MBR",
            format!(
                "{:#010x}",
                u32::from_le_bytes(dev.partition_signature[..4].try_into().unwrap())
            ),
        ),
        PartitionFormat::GUID => ("GPT", Guid::from_bytes(dev.partition_signature).to_string()),
        _ => ("", String::new()),
    };

    // Partition zero addresses the whole device; start and size carry no
    // information there.
    let range = if number != 0 {
        format!(",{start:#x},{size:#x}")
    } else {
        String::new()
    };

    format!("HD({number},{format_name},{signature}{range})")
}

/// EISA compressed ID: three letters at five bits each (offset from `@`) in
/// the low half, four hex digits of device in the high half.
fn eisa_id(v: u32) -> String {
    let vendor = v & 0xffff;
    let c1 = (((vendor >> 10) & 0x1f) as u8 + b'@') as char;
    let c2 = (((vendor >> 5) & 0x1f) as u8 + b'@') as char;
    let c3 = ((vendor & 0x1f) as u8 + b'@') as char;
    format!("{c1}{c2}{c3}{:04X}", v >> 16)
}

/// A parsed device path: the node list, end markers included.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DevicePathList(pub Vec<DevicePathNode>);

impl DevicePathList {
    /// Parses nodes until (and including) an end-of-entire marker, returning
    /// the list and the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), ParseError> {
        Self::parse_at(data, 0)
    }

    pub(crate) fn parse_at(data: &[u8], base: usize) -> Result<(Self, usize), ParseError> {
        let mut r = ByteReader::at(data, base);
        let mut nodes = Vec::new();

        loop {
            let node_offset = r.offset();
            let header: DevicePathHeader = r
                .read()
                .map_err(|_| ParseError::Header(node_offset))?;

            let length = u16::from_le_bytes(header.length) as usize;
            let body_len = length
                .checked_sub(size_of::<DevicePathHeader>())
                .ok_or(ParseError::BadHeader(node_offset))?;
            let body = r.bytes(body_len)?;

            let node = DevicePathNode::parse_body(
                header.device_type,
                header.sub_type,
                body,
                node_offset + size_of::<DevicePathHeader>(),
            )?;

            // Anything terminating the list other than an explicit
            // end-of-instance stops the walk.
            let stop = matches!(&node, DevicePathNode::End(end) if !matches!(end, EndPath::Instance));
            nodes.push(node);
            if stop {
                break;
            }
        }

        Ok((DevicePathList(nodes), r.offset() - base))
    }

    pub fn write_into(&self, out: &mut Vec<u8>) {
        for node in &self.0 {
            node.write_into(out);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    /// One rendered string per instance, nodes joined with `/`. End markers
    /// contribute no text.
    pub fn all_text(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for node in &self.0 {
            match node {
                DevicePathNode::End(end) => {
                    out.push(current.join("/"));
                    current.clear();
                    if !matches!(end, EndPath::Instance) {
                        return out;
                    }
                }
                node => {
                    if let Some(text) = node.text() {
                        current.push(text);
                    }
                }
            }
        }

        if !current.is_empty() {
            out.push(current.join("/"));
        }
        out
    }
}
