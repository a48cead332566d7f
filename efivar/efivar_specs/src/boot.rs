// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Definitions related to UEFI boot entries

use bitfield_struct::bitfield;
use open_enum::open_enum;
use std::fmt;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// From UEFI spec 10.2
///
/// `length` counts the entire node, header included, so the body is
/// `length - 4` bytes.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct DevicePathHeader {
    pub device_type: DeviceType,
    pub sub_type: u8,
    pub length: [u8; 2],
}

/// From UEFI spec 3.1.3
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct LoadOptionHeader {
    pub attributes: u32,
    pub file_path_list_length: u16,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum DeviceType {
    HARDWARE = 0x01,
    ACPI = 0x02,
    MESSAGING = 0x03,
    MEDIA = 0x04,
    BIOS_BOOT_SPEC = 0x05,
    END = 0x7F,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum EndDeviceSubType {
    INSTANCE = 0x01,
    ENTIRE = 0xFF,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum HardwareDeviceSubType {
    PCI = 1,
    PCCARD = 2,
    MEMORY_MAPPED = 3,
    VENDOR = 4,
    CONTROLLER = 5,
    BMC = 6,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum AcpiDeviceSubType {
    ACPI = 1,
    EXPANDED_ACPI = 2,
    ADR = 3,
    NVDIMM = 4,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum MessagingDeviceSubType {
    ATAPI = 1,
    SCSI = 2,
    FIBRE_CHANNEL = 3,
    IEEE_1394 = 4,
    USB = 5,
    SATA = 18,
    USB_WWID = 16,
    LOGICAL_UNIT = 17,
    USB_CLASS = 15,
    MAC_ADDRESS = 11,
    IPV4 = 12,
    IPV6 = 13,
    VLAN = 20,
    INFINIBAND = 9,
    UART = 14,
    SAS = 10,
    SAS_EX = 22,
    ISCSI = 19,
    NVME_NAMESPACE = 23,
    URI = 24,
    UFS = 25,
    SD = 26,
    BLUETOOTH = 27,
    WIFI = 28,
    EMMC = 29,
    BLUETOOTH_LE = 30,
    DNS = 31,
    NVDIMM = 32,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum MediaDeviceSubType {
    HARD_DRIVE = 0x01,
    CD_ROM = 0x02,
    VENDOR = 0x03,
    FILE = 0x04,
    MEDIA_PROTOCOL = 0x05,
    PIWG_FIRMWARE_FILE = 0x06,
    PIWG_FIRMWARE_VOLUME = 0x07,
    RELATIVE_OFFSET_RANGE = 0x08,
    RAM_DISK = 0x09,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum BiosBootDeviceSubType {
    BIOS_BOOT_SPEC = 0x01,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum PartitionFormat {
    MBR = 0x01,
    GUID = 0x02,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub enum SignatureType {
    NONE = 0x00,
    MBR = 0x01,
    GUID = 0x02,
}

/// From UEFI spec 10.3.2.1
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct PciDevice {
    pub function: u8,
    pub device: u8,
}

/// From UEFI spec 10.3.3 - the compressed HID/UID form
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct AcpiDevice {
    pub hid: u32,
    pub uid: u32,
}

/// From UEFI spec 10.3.5.1
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct HardDriveDevice {
    /// Entry in the partition table, starting at 1. Zero means the entire
    /// device.
    pub partition_number: u32,
    pub partition_start: u64,
    pub partition_size: u64,
    /// Interpretation depends on `signature_type`: MBR signatures occupy the
    /// first four bytes (little-endian), GPT signatures all sixteen.
    pub partition_signature: [u8; 16],
    pub partition_format: PartitionFormat,
    pub signature_type: SignatureType,
}

/// From UEFI spec 10.3.5.2
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct CdromDevice {
    /// Entry from the Boot Catalog; the Initial/Default entry is zero.
    pub boot_entry: u32,
    pub partition_start: u64,
    pub partition_size: u64,
}

/// From UEFI spec 10.3.7, minus the trailing null-terminated ASCII
/// description.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct BiosBootSpecDevice {
    pub device_type: u16,
    pub status_flag: u16,
}

#[open_enum]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd)]
/// Subfield of [`LoadOptionAttributes`] grouping entries in the boot
/// manager's menus.
pub enum LoadOptionCategory {
    BOOT = 0x00,
    APP = 0x01,
}

impl LoadOptionCategory {
    const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    const fn into_bits(self) -> u8 {
        self.0
    }
}

/// UEFI spec 3.1.3 - attributes of a single load option. Not to be confused
/// with the attributes of the variable that stores it.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct LoadOptionAttributes {
    pub active: bool,
    pub force_reconnect: bool,
    _reserved0: bool,
    pub hidden: bool,

    #[bits(4)]
    _reserved1: u8,

    #[bits(5)]
    pub category: LoadOptionCategory,

    #[bits(19)]
    _reserved2: u32,
}

impl fmt::Display for LoadOptionAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.active(), "Active"),
            (self.force_reconnect(), "ForceReconnect"),
            (self.hidden(), "Hidden"),
            (self.category() == LoadOptionCategory::APP, "App"),
        ];

        let mut any = false;
        for (set, name) in flags {
            if set {
                if any {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                any = true;
            }
        }
        if !any {
            f.write_str("Boot")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_subfield() {
        // The category subfield occupies 0x0000_1F00.
        let attrs = LoadOptionAttributes::from(0x0000_0100);
        assert_eq!(attrs.category(), LoadOptionCategory::APP);
        assert!(!attrs.active());

        let attrs = LoadOptionAttributes::new()
            .with_active(true)
            .with_category(LoadOptionCategory::APP);
        assert_eq!(u32::from(attrs), 0x0000_0101);
    }

    #[test]
    fn attribute_text() {
        assert_eq!(
            LoadOptionAttributes::from(0x0000_0009).to_string(),
            "Active+Hidden"
        );
        assert_eq!(LoadOptionAttributes::new().to_string(), "Boot");
    }

    #[test]
    fn header_layout() {
        assert_eq!(size_of::<DevicePathHeader>(), 4);
        assert_eq!(size_of::<LoadOptionHeader>(), 6);
        assert_eq!(size_of::<HardDriveDevice>(), 38);
        assert_eq!(size_of::<CdromDevice>(), 20);
    }
}
