pub(crate) mod byte_cursor;
pub(crate) mod bytes;
mod hexdump;

pub(crate) use self::byte_cursor::ByteCursor;
pub(crate) use self::hexdump::{dump_parameters, hex_bytes};
