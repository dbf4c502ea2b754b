//! Device identity check.
//!
//! A container names the device family it was built for; loading it on
//! the wrong silicon bricks the boot. The container carries a primary
//! IDCODE and a 14-bit extended IDCODE; the device exposes the former
//! on the tap and the latter in the efuse cache, in one of two
//! encodings selected by the top bit of the efuse word.

use crate::error::{LoaderError, Result};
use crate::header::{IhtAttributes, ImageHeaderTable};
use crate::platform::PlatformRegs;

/// Extended IDCODE value space in the header table
pub const EXT_IDCODE_MASK: u32 = 0x3FFF;

/// Efuse bit selecting the extended IDCODE encoding
pub const EXT_IDCODE_SEL_MASK: u32 = 1 << 31;

/// Encoding 0: extended IDCODE in the low 14 bits
pub const EXT_IDCODE_FIELD1_MASK: u32 = 0x3FFF;

/// Encoding 1: extended IDCODE in bits [27:14]
pub const EXT_IDCODE_FIELD2_MASK: u32 = 0x0FFF_C000;

/// Shift of encoding 1
pub const EXT_IDCODE_FIELD2_SHIFT: u32 = 14;

/// Silicon-revision subfield of the primary IDCODE
pub const IDCODE_SI_REV_MASK: u32 = 0xF000_0000;

/// First-revision device shipped before the extended IDCODE efuses
/// were programmed; a zero efuse word is legitimate there
pub const LEGACY_SI_IDCODE: u32 = 0x14CA_8093;

/// Check the container's device identity fields against the silicon.
///
/// Emulation platforms skip the check. A zero extended-IDCODE efuse on
/// anything but the legacy revision is rejected before any compare;
/// the extended compare itself only runs when the efuse is programmed.
pub fn id_code_check(table: &ImageHeaderTable, regs: &dyn PlatformRegs) -> Result<()> {
    if !regs.is_silicon() {
        return Ok(());
    }

    let idcode_rd = regs.idcode();
    let ext_raw = regs.ext_idcode();
    let ext_iht = table.ext_idcode & EXT_IDCODE_MASK;

    let (ext_zero, ext_rd) = if ext_raw == 0 {
        (true, 0)
    } else if ext_raw & EXT_IDCODE_SEL_MASK == 0 {
        (false, ext_raw & EXT_IDCODE_FIELD1_MASK)
    } else {
        (false, (ext_raw & EXT_IDCODE_FIELD2_MASK) >> EXT_IDCODE_FIELD2_SHIFT)
    };

    let legacy = idcode_rd == LEGACY_SI_IDCODE;
    if ext_zero && !legacy {
        log::error!("extended IDCODE efuse unprogrammed on non-legacy silicon");
        return Err(LoaderError::InvalidZeroExtIdCode);
    }

    let mut device_id = idcode_rd;
    let mut container_id = table.idcode;
    if table.flags().contains(IhtAttributes::IDCODE_BYPASS) {
        device_id &= !IDCODE_SI_REV_MASK;
        container_id &= !IDCODE_SI_REV_MASK;
    }
    if device_id != container_id {
        log::error!(
            "IDCODE mismatch: device {:#x}, container {:#x}",
            idcode_rd,
            table.idcode
        );
        return Err(LoaderError::IdCodeMismatch);
    }

    if !ext_zero && ext_rd != ext_iht {
        log::error!(
            "extended IDCODE mismatch: device {:#x}, container {:#x}",
            ext_rd,
            ext_iht
        );
        return Err(LoaderError::ExtIdCodeMismatch);
    }

    Ok(())
}
