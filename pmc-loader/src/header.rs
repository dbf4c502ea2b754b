//! Boot container header model.
//!
//! A container starts with a 64-byte image header table, followed (at
//! offsets the table names) by one 32-byte image header per image and
//! one 32-byte partition header per partition. All fields are
//! little-endian u32 words; the last word of each record is the
//! ones-complement checksum of the words before it.

use alloc::vec::Vec;
use bitflags::bitflags;
use static_assertions::const_assert_eq;

use crate::device::BootDeviceOps;
use crate::error::{LoaderError, Result};
use crate::source::SbdSelector;

/// Image header table size in bytes
pub const IHT_SIZE: usize = 64;

/// Image header record size in bytes
pub const IMAGE_HEADER_SIZE: usize = 32;

/// Partition header record size in bytes
pub const PARTITION_HEADER_SIZE: usize = 32;

/// Supported container format version
pub const IHT_VERSION: u32 = 0x0000_0002;

/// Structural limit on images per container
pub const MAX_IMAGES: u32 = 32;

/// Structural limit on partitions per container
pub const MAX_PARTITIONS: u32 = 32;

const_assert_eq!(IHT_SIZE % 4, 0);
const_assert_eq!(IMAGE_HEADER_SIZE % 4, 0);
const_assert_eq!(PARTITION_HEADER_SIZE % 4, 0);

bitflags! {
    /// Image header table attribute flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IhtAttributes: u32 {
        /// Container is signed; header chain must authenticate
        const SIGNED = 1 << 0;
        /// Partition payloads are encrypted
        const ENCRYPTED = 1 << 1;
        /// Skip the silicon-revision subfield in the IDCODE compare
        const IDCODE_BYPASS = 1 << 2;
    }
}

/// Bit position of the secondary boot device field in the attribute word
pub const IHT_ATTR_SBD_SHIFT: u32 = 6;

/// Width mask of the secondary boot device field
pub const IHT_ATTR_SBD_MASK: u32 = 0xF << IHT_ATTR_SBD_SHIFT;

fn word(bytes: &[u8], index: usize) -> u32 {
    let offset = index * 4;
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn put_word(bytes: &mut [u8], index: usize, value: u32) {
    bytes[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

/// Ones-complement checksum over a record's payload words
pub fn checksum(bytes: &[u8], words: usize) -> u32 {
    let mut sum: u32 = 0;
    for index in 0..words {
        sum = sum.wrapping_add(word(bytes, index));
    }
    !sum
}

/// Image header table: container-wide counts, offsets and attributes.
#[derive(Debug, Clone, Copy)]
pub struct ImageHeaderTable {
    pub version: u32,
    pub image_count: u32,
    /// Byte offset of the image header array from the container start
    pub image_header_offset: u32,
    pub partition_count: u32,
    /// Byte offset of the partition header array from the container start
    pub partition_header_offset: u32,
    sbd_address_lo: u32,
    sbd_address_hi: u32,
    pub attributes: u32,
    pub idcode: u32,
    pub ext_idcode: u32,
    checksum: u32,
}

impl ImageHeaderTable {
    /// Parse a table from its wire bytes; structure is not validated
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IHT_SIZE {
            return Err(LoaderError::HeaderTable);
        }
        Ok(Self {
            version: word(bytes, 0),
            image_count: word(bytes, 1),
            image_header_offset: word(bytes, 2),
            partition_count: word(bytes, 3),
            partition_header_offset: word(bytes, 4),
            sbd_address_lo: word(bytes, 5),
            sbd_address_hi: word(bytes, 6),
            attributes: word(bytes, 7),
            idcode: word(bytes, 8),
            ext_idcode: word(bytes, 9),
            checksum: word(bytes, 15),
        })
    }

    /// Structural validation: version, counts and checksum.
    ///
    /// `raw` is the wire image the table was parsed from; the checksum
    /// covers it, reserved words included.
    pub fn validate(&self, raw: &[u8; IHT_SIZE]) -> Result<()> {
        if self.version != IHT_VERSION {
            log::error!("header table: unsupported version {:#x}", self.version);
            return Err(LoaderError::HeaderTable);
        }
        if self.image_count == 0 || self.image_count > MAX_IMAGES {
            log::error!("header table: bad image count {}", self.image_count);
            return Err(LoaderError::HeaderTable);
        }
        if self.partition_count == 0 || self.partition_count > MAX_PARTITIONS {
            log::error!(
                "header table: bad partition count {}",
                self.partition_count
            );
            return Err(LoaderError::HeaderTable);
        }
        if checksum(raw, 15) != self.checksum {
            log::error!("header table: checksum mismatch");
            return Err(LoaderError::HeaderTable);
        }
        Ok(())
    }

    /// Attribute flags
    pub fn flags(&self) -> IhtAttributes {
        IhtAttributes::from_bits_truncate(self.attributes)
    }

    /// Secondary boot device selector from the attribute word
    pub fn secondary_boot_device(&self) -> SbdSelector {
        SbdSelector::from_field((self.attributes & IHT_ATTR_SBD_MASK) >> IHT_ATTR_SBD_SHIFT)
    }

    /// Secondary container address on the secondary boot device
    pub fn sbd_address(&self) -> u64 {
        u64::from(self.sbd_address_lo) | (u64::from(self.sbd_address_hi) << 32)
    }

    /// Serialize with a freshly computed checksum (host-side container
    /// assembly and tests)
    pub fn encode(&self) -> [u8; IHT_SIZE] {
        let mut bytes = [0u8; IHT_SIZE];
        put_word(&mut bytes, 0, self.version);
        put_word(&mut bytes, 1, self.image_count);
        put_word(&mut bytes, 2, self.image_header_offset);
        put_word(&mut bytes, 3, self.partition_count);
        put_word(&mut bytes, 4, self.partition_header_offset);
        put_word(&mut bytes, 5, self.sbd_address_lo);
        put_word(&mut bytes, 6, self.sbd_address_hi);
        put_word(&mut bytes, 7, self.attributes);
        put_word(&mut bytes, 8, self.idcode);
        put_word(&mut bytes, 9, self.ext_idcode);
        let sum = checksum(&bytes, 15);
        put_word(&mut bytes, 15, sum);
        bytes
    }

    /// Build a table for host-side container assembly
    pub fn new(
        image_count: u32,
        image_header_offset: u32,
        partition_count: u32,
        partition_header_offset: u32,
    ) -> Self {
        Self {
            version: IHT_VERSION,
            image_count,
            image_header_offset,
            partition_count,
            partition_header_offset,
            sbd_address_lo: 0,
            sbd_address_hi: 0,
            attributes: 0,
            idcode: 0,
            ext_idcode: 0,
            checksum: 0,
        }
    }

    /// Set the secondary boot address (host-side assembly)
    pub fn set_sbd_address(&mut self, address: u64) {
        self.sbd_address_lo = address as u32;
        self.sbd_address_hi = (address >> 32) as u32;
    }
}

/// Image attribute flag: stage to working memory, start on demand
pub const IMAGE_ATTR_DELAY_LOAD: u32 = 1 << 0;

/// One image header record.
#[derive(Debug, Clone, Copy)]
pub struct ImageHeader {
    pub image_id: u32,
    pub name: [u8; 16],
    pub partition_count: u32,
    pub attributes: u32,
}

impl ImageHeader {
    /// Parse and checksum-verify one record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IMAGE_HEADER_SIZE {
            return Err(LoaderError::ImageHeader);
        }
        if checksum(bytes, 7) != word(bytes, 7) {
            return Err(LoaderError::ImageHeader);
        }
        let mut name = [0u8; 16];
        name.copy_from_slice(&bytes[4..20]);
        Ok(Self {
            image_id: word(bytes, 0),
            name,
            partition_count: word(bytes, 5),
            attributes: word(bytes, 6),
        })
    }

    /// Image name, trimmed at the first NUL
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(16);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Image is staged now and started on demand
    pub fn delay_load(&self) -> bool {
        self.attributes & IMAGE_ATTR_DELAY_LOAD != 0
    }

    /// Clear the delay flag once the image is staged
    pub fn clear_delay_load(&mut self) {
        self.attributes &= !IMAGE_ATTR_DELAY_LOAD;
    }

    /// Serialize with a freshly computed checksum
    pub fn encode(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let mut bytes = [0u8; IMAGE_HEADER_SIZE];
        put_word(&mut bytes, 0, self.image_id);
        bytes[4..20].copy_from_slice(&self.name);
        put_word(&mut bytes, 5, self.partition_count);
        put_word(&mut bytes, 6, self.attributes);
        let sum = checksum(&bytes, 7);
        put_word(&mut bytes, 7, sum);
        bytes
    }
}

/// Destination-core field of the partition attribute word
pub const PRTN_ATTR_DST_CPU_MASK: u32 = 0xF;

/// Set for 32-bit execution state on an application core
pub const PRTN_ATTR_EXEC_STATE_A32: u32 = 1 << 8;

/// Set when the core's reset vector is the high vector base
pub const PRTN_ATTR_VEC_HI: u32 = 1 << 9;

/// One partition header record.
#[derive(Debug, Clone, Copy)]
pub struct PartitionHeader {
    /// Payload length in bytes
    pub total_len: u32,
    /// Payload byte offset from the container start
    pub data_offset: u32,
    dest_address_lo: u32,
    dest_address_hi: u32,
    handoff_address_lo: u32,
    handoff_address_hi: u32,
    pub attributes: u32,
}

impl PartitionHeader {
    /// Parse and checksum-verify one record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PARTITION_HEADER_SIZE {
            return Err(LoaderError::PartitionHeader);
        }
        if checksum(bytes, 7) != word(bytes, 7) {
            return Err(LoaderError::PartitionHeader);
        }
        Ok(Self {
            total_len: word(bytes, 0),
            data_offset: word(bytes, 1),
            dest_address_lo: word(bytes, 2),
            dest_address_hi: word(bytes, 3),
            handoff_address_lo: word(bytes, 4),
            handoff_address_hi: word(bytes, 5),
            attributes: word(bytes, 6),
        })
    }

    /// Physical destination address of the payload
    pub fn dest_address(&self) -> u64 {
        u64::from(self.dest_address_lo) | (u64::from(self.dest_address_hi) << 32)
    }

    /// Execution entry address for the destination core
    pub fn handoff_address(&self) -> u64 {
        u64::from(self.handoff_address_lo) | (u64::from(self.handoff_address_hi) << 32)
    }

    /// Destination core field value; zero means a data-only partition
    pub fn dest_cpu_field(&self) -> u32 {
        self.attributes & PRTN_ATTR_DST_CPU_MASK
    }

    /// 32-bit execution state requested for an application core
    pub fn exec_state_a32(&self) -> bool {
        self.attributes & PRTN_ATTR_EXEC_STATE_A32 != 0
    }

    /// Reset vector at the high vector base
    pub fn vector_high(&self) -> bool {
        self.attributes & PRTN_ATTR_VEC_HI != 0
    }

    /// Serialize with a freshly computed checksum
    pub fn encode(&self) -> [u8; PARTITION_HEADER_SIZE] {
        let mut bytes = [0u8; PARTITION_HEADER_SIZE];
        put_word(&mut bytes, 0, self.total_len);
        put_word(&mut bytes, 1, self.data_offset);
        put_word(&mut bytes, 2, self.dest_address_lo);
        put_word(&mut bytes, 3, self.dest_address_hi);
        put_word(&mut bytes, 4, self.handoff_address_lo);
        put_word(&mut bytes, 5, self.handoff_address_hi);
        put_word(&mut bytes, 6, self.attributes);
        let sum = checksum(&bytes, 7);
        put_word(&mut bytes, 7, sum);
        bytes
    }

    /// Build a record for host-side container assembly
    pub fn new(total_len: u32, data_offset: u32, dest_address: u64, handoff_address: u64) -> Self {
        Self {
            total_len,
            data_offset,
            dest_address_lo: dest_address as u32,
            dest_address_hi: (dest_address >> 32) as u32,
            handoff_address_lo: handoff_address as u32,
            handoff_address_hi: (handoff_address >> 32) as u32,
            attributes: 0,
        }
    }
}

/// Parsed header chain of one container, bound to its source offset.
#[derive(Clone)]
pub struct MetaHeader {
    pub table: ImageHeaderTable,
    /// Wire image of the table, for authentication and re-validation
    pub raw_table: [u8; IHT_SIZE],
    pub images: Vec<ImageHeader>,
    pub partitions: Vec<PartitionHeader>,
    /// Container base on the boot source; all header and payload
    /// offsets are relative to it
    pub flash_offset: u64,
}

impl MetaHeader {
    /// Read and parse the header table at `flash_offset`
    pub fn read_table(device: &mut dyn BootDeviceOps, flash_offset: u64) -> Result<Self> {
        let mut raw_table = [0u8; IHT_SIZE];
        device.read(flash_offset, &mut raw_table)?;
        let table = ImageHeaderTable::from_bytes(&raw_table)?;
        Ok(Self {
            table,
            raw_table,
            images: Vec::new(),
            partitions: Vec::new(),
            flash_offset,
        })
    }

    /// Structural validation of the parsed table
    pub fn validate_table(&self) -> Result<()> {
        self.table.validate(&self.raw_table)
    }

    /// Read and checksum-verify all image header records
    pub fn read_image_headers(&mut self, device: &mut dyn BootDeviceOps) -> Result<()> {
        self.images.clear();
        let base = self.flash_offset + u64::from(self.table.image_header_offset);
        for index in 0..self.table.image_count {
            let mut bytes = [0u8; IMAGE_HEADER_SIZE];
            device.read(base + u64::from(index) * IMAGE_HEADER_SIZE as u64, &mut bytes)?;
            self.images.push(ImageHeader::from_bytes(&bytes)?);
        }
        Ok(())
    }

    /// Read and checksum-verify all partition header records
    pub fn read_partition_headers(&mut self, device: &mut dyn BootDeviceOps) -> Result<()> {
        self.partitions.clear();
        let base = self.flash_offset + u64::from(self.table.partition_header_offset);
        for index in 0..self.table.partition_count {
            let mut bytes = [0u8; PARTITION_HEADER_SIZE];
            device.read(
                base + u64::from(index) * PARTITION_HEADER_SIZE as u64,
                &mut bytes,
            )?;
            self.partitions.push(PartitionHeader::from_bytes(&bytes)?);
        }
        Ok(())
    }
}
