// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Codec for the load option structure stored in `Boot####` variables.

use crate::device_path::DevicePathList;
use crate::reader::ByteReader;
use crate::ParseError;
use efivar_specs::boot::LoadOptionAttributes;
use efivar_specs::boot::LoadOptionHeader;
use ucs2::Ucs2String;
use zerocopy::IntoBytes;

/// A bootable item: what to show the user, where to find the image, and what
/// to hand it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOption {
    pub attributes: LoadOptionAttributes,
    /// User readable description, null-terminated UCS-2.
    pub description: Ucs2String,
    /// The first instance locates the image; further instances are
    /// vendor-specific.
    pub file_path_list: DevicePathList,
    /// Opaque bytes passed to the loaded image; empty means none.
    pub optional_data: Vec<u8>,
}

impl LoadOption {
    /// Decodes a load option, returning it and the total bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), ParseError> {
        let mut r = ByteReader::new(data);
        let header: LoadOptionHeader = r.read()?;

        let description = r
            .read_ucs2_nul()
            .map_err(ParseError::Description)?
            .to_ucs2_string();

        let declared = header.file_path_list_length as usize;
        let file_path_list = if declared > 0 {
            let base = r.offset();
            let bytes = r.bytes(declared)?;
            let (list, consumed) = DevicePathList::parse_at(bytes, base)?;
            if consumed != declared {
                return Err(ParseError::PathListLength { declared, consumed });
            }
            list
        } else {
            DevicePathList::default()
        };

        let optional_data = r.rest().to_vec();

        Ok((
            LoadOption {
                attributes: LoadOptionAttributes::from(header.attributes),
                description,
                file_path_list,
                optional_data,
            },
            r.offset(),
        ))
    }

    /// Serializes the load option, recomputing the file-path-list length.
    pub fn write_into(&self, out: &mut Vec<u8>) {
        let paths = self.file_path_list.to_bytes();
        let header = LoadOptionHeader {
            attributes: self.attributes.into(),
            file_path_list_length: paths.len() as u16,
        };
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.description.as_bytes());
        out.extend_from_slice(&paths);
        out.extend_from_slice(&self.optional_data);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    pub fn description_string(&self) -> String {
        self.description.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_path::DevicePathNode;
    use crate::device_path::EndPath;
    use crate::device_path::MediaPath;
    use efivar_specs::boot::HardDriveDevice;
    use efivar_specs::boot::PartitionFormat;
    use efivar_specs::boot::SignatureType;

    fn grub_on_gpt() -> LoadOption {
        LoadOption {
            attributes: LoadOptionAttributes::new().with_active(true),
            description: Ucs2String::from("Linux"),
            file_path_list: DevicePathList(vec![
                DevicePathNode::Media(MediaPath::HardDrive(HardDriveDevice {
                    partition_number: 1,
                    partition_start: 0x800,
                    partition_size: 0x32000,
                    partition_signature: [0xFF; 16],
                    partition_format: PartitionFormat::GUID,
                    signature_type: SignatureType::GUID,
                })),
                DevicePathNode::Media(MediaPath::FilePath(Ucs2String::from(
                    "EFI\\LINUX\\GRUB.EFI",
                ))),
                DevicePathNode::End(EndPath::Entire),
            ]),
            optional_data: Vec::new(),
        }
    }

    #[test]
    fn round_trip() {
        let option = grub_on_gpt();
        let encoded = option.to_bytes();
        assert_eq!(encoded.len(), 106);

        let (decoded, consumed) = LoadOption::parse(&encoded).unwrap();
        assert_eq!(consumed, 106);
        assert_eq!(decoded, option);
        assert_eq!(decoded.description_string(), "Linux");
        assert_eq!(
            decoded.file_path_list.all_text(),
            vec![
                "HD(1,GPT,FFFFFFFF-FFFF-FFFF-FFFF-FFFFFFFFFFFF,0x800,0x32000)/File(EFI\\LINUX\\GRUB.EFI)"
                    .to_string()
            ]
        );
        assert!(decoded.optional_data.is_empty());
        assert_eq!(decoded.to_bytes(), encoded);
    }

    #[test]
    fn optional_data_trailer() {
        let mut option = grub_on_gpt();
        option.optional_data = vec![0x00, 0x00];

        let encoded = option.to_bytes();
        let (decoded, consumed) = LoadOption::parse(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.optional_data, [0x00, 0x00]);
        assert_eq!(decoded.to_bytes(), encoded);
    }

    #[test]
    fn description_must_terminate() {
        // Header plus an unterminated description.
        let mut data = 1u32.to_le_bytes().to_vec();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&[0x4C, 0x00, 0x69, 0x00]);

        assert!(matches!(
            LoadOption::parse(&data),
            Err(ParseError::Description(_))
        ));
    }

    #[test]
    fn path_list_length_must_match() {
        let option = grub_on_gpt();
        let mut encoded = option.to_bytes();
        // Grow the declared length past the actual list; the extra bytes form
        // a valid node so the mismatch itself is what trips.
        let declared = (encoded.len() - 6 - 12 + 4) as u16;
        encoded[4..6].copy_from_slice(&declared.to_le_bytes());
        encoded.extend_from_slice(&[0x7F, 0xFF, 0x04, 0x00]);

        assert!(matches!(
            LoadOption::parse(&encoded),
            Err(ParseError::PathListLength { .. })
        ));
    }

    #[test]
    fn empty_path_list() {
        let mut data = 0u32.to_le_bytes().to_vec();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(Ucs2String::from("Setup").as_bytes());
        data.extend_from_slice(&[0xAB]);

        let (decoded, consumed) = LoadOption::parse(&data).unwrap();
        assert_eq!(consumed, data.len());
        assert!(decoded.file_path_list.0.is_empty());
        assert_eq!(decoded.optional_data, [0xAB]);
    }
}
