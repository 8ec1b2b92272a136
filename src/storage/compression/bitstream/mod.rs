mod bit_array;
mod simple8b;

pub use bit_array::{BitArrayBuilder, BitArrayReader, ForwardBitCursor, ReverseBitCursor};
pub use simple8b::{
    decode_bitmap, total_item_count, Simple8bRleBuilder, Simple8bRleForwardIter, Simple8bRleReverseIter,
};
