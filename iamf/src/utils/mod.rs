/// Bit-granular read/write buffers and the LEB128 codecs.
pub mod bit_buffer;

/// Typed error enums and the coarse status taxonomy.
pub mod errors;
