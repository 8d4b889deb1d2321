//! Shape records for the bitmap-filled rectangle that displays MJPEG frames.

use flashmux_bits::{encode_line_edge, BitPacker};

use crate::error::Result;

const STATE_MOVE_TO: i32 = 0x01;
const STATE_FILL_STYLE0: i32 = 0x02;

/// Pack the SHAPE records of a `width` x `height` rectangle filled with
/// fill style 1, starting at the origin.
pub fn encode_filled_rect_outline(width: i32, height: i32) -> Result<Vec<u8>> {
    let mut p = BitPacker::new();

    p.put_bits(4, 1)?; // fill index bits
    p.put_bits(4, 0)?; // line index bits

    // style change: move to (0, 0), select fill 1
    p.put_flag(false)?;
    p.put_bits(5, STATE_MOVE_TO | STATE_FILL_STYLE0)?;
    p.put_bits(5, 1)?;
    p.put_bits(1, 0)?;
    p.put_bits(1, 0)?;
    p.put_bits(1, 1)?;

    encode_line_edge(&mut p, width, 0)?;
    encode_line_edge(&mut p, 0, height)?;
    encode_line_edge(&mut p, -width, 0)?;
    encode_line_edge(&mut p, 0, -height)?;

    // end of shape
    p.put_flag(false)?;
    p.put_bits(5, 0)?;

    Ok(p.flush()?)
}
