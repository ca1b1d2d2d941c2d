mod bit_reader;
mod byte_reader;
mod sub_block_reader;

pub use bit_reader::BitReader;
pub use byte_reader::ByteReader;
pub use sub_block_reader::SubBlockReader;
