//! Implement the `Serializer` and `Deserializer` objects using LEB128.
//!
//! Every variable-length field is prefixed by its LEB128-encoded length. The
//! deserializer never trusts a length prefix: it is checked against the
//! remaining input before anything is allocated.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use crate::Error;

/// Objects with a binary encoding.
pub trait Serializable: Sized {
    /// Exact number of bytes written by `write`.
    fn length(&self) -> usize;

    fn write(&self, ser: &mut Serializer) -> Result<usize, Error>;

    fn read(de: &mut Deserializer) -> Result<Self, Error>;

    fn serialize(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        let mut ser = Serializer::with_capacity(self.length());
        self.write(&mut ser)?;
        Ok(ser.finalize())
    }

    /// Reads an object from the given bytes, rejecting trailing data.
    fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut de = Deserializer::new(bytes);
        let object = Self::read(&mut de)?;
        if de.remaining() != 0 {
            return Err(Error::Marshal(format!(
                "{} trailing bytes after the encoded object",
                de.remaining()
            )));
        }
        Ok(object)
    }
}

/// Returns the length of the LEB128 encoding of `n`.
#[must_use]
pub fn to_leb128_len(n: usize) -> usize {
    let mut n = n;
    let mut len = 1;
    while n >= 0x80 {
        n >>= 7;
        len += 1;
    }
    len
}

pub struct Deserializer<'a> {
    readable: &'a [u8],
}

impl<'a> Deserializer<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Deserializer<'a> {
        Deserializer { readable: bytes }
    }

    /// Number of bytes not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.readable.len()
    }

    pub fn read_leb128_u64(&mut self) -> Result<u64, Error> {
        leb128::read::unsigned(&mut self.readable).map_err(|e| {
            Error::Marshal(format!(
                "Deserializer: failed reading the next LEB128 integer: {e}"
            ))
        })
    }

    /// Reads a LEB128 count and checks it does not exceed `max`.
    pub fn read_count(&mut self, max: usize) -> Result<usize, Error> {
        let n = usize::try_from(self.read_leb128_u64()?)?;
        if n > max {
            return Err(Error::Marshal(format!(
                "Deserializer: count {n} exceeds the maximum {max}"
            )));
        }
        Ok(n)
    }

    pub fn read_array<const LENGTH: usize>(&mut self) -> Result<[u8; LENGTH], Error> {
        let mut buf = [0_u8; LENGTH];
        self.readable.read_exact(&mut buf).map_err(|_| {
            Error::Marshal(format!(
                "Deserializer: failed reading array of {LENGTH} bytes"
            ))
        })?;
        Ok(buf)
    }

    pub fn read_vec(&mut self) -> Result<Vec<u8>, Error> {
        let len = usize::try_from(self.read_leb128_u64()?)?;
        if len > self.readable.len() {
            return Err(Error::Marshal(format!(
                "Deserializer: announced {len} bytes, only {} left",
                self.readable.len()
            )));
        }
        let (head, tail) = self.readable.split_at(len);
        self.readable = tail;
        Ok(head.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, Error> {
        let bytes = self.read_vec()?;
        Ok(std::str::from_utf8(&bytes)?.to_string())
    }

    pub fn read<T: Serializable>(&mut self) -> Result<T, Error> {
        T::read(self)
    }
}

pub struct Serializer {
    writable: Zeroizing<Vec<u8>>,
}

impl Serializer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            writable: Zeroizing::new(vec![]),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            writable: Zeroizing::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn write_leb128_u64(&mut self, n: u64) -> Result<usize, Error> {
        leb128::write::unsigned(&mut *self.writable, n).map_err(|e| {
            Error::Marshal(format!(
                "Serializer: unexpected LEB128 error writing {n}: {e}"
            ))
        })
    }

    /// Writes the given bytes without length prefix.
    pub fn write_array(&mut self, array: &[u8]) -> Result<usize, Error> {
        self.writable.write_all(array)?;
        Ok(array.len())
    }

    /// Writes the given bytes prefixed by their length.
    pub fn write_vec(&mut self, vector: &[u8]) -> Result<usize, Error> {
        let n = self.write_leb128_u64(vector.len() as u64)?;
        Ok(n + self.write_array(vector)?)
    }

    pub fn write<T: Serializable>(&mut self, object: &T) -> Result<usize, Error> {
        object.write(self)
    }

    #[must_use]
    pub fn finalize(self) -> Zeroizing<Vec<u8>> {
        self.writable
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{to_leb128_len, Deserializer, Serializer};
    use crate::Error;

    #[test]
    pub fn test_ser_de() -> Result<(), Error> {
        let a1 = b"azerty".to_vec();
        let a2 = b"".to_vec();
        let a3 = "nbvcxwmlkjhgfdsqpoiuytreza)àç_è-('é&".as_bytes().to_vec();

        let mut ser = Serializer::new();
        assert_eq!(7, ser.write_vec(&a1)?);
        assert_eq!(1, ser.write_vec(&a2)?);
        assert_eq!(41, ser.write_vec(&a3)?);
        assert_eq!(4, ser.write_array(&[1, 2, 3, 4])?);
        let bytes = ser.finalize();
        assert_eq!(53, bytes.len());

        let mut de = Deserializer::new(&bytes);
        assert_eq!(a1, de.read_vec()?);
        assert_eq!(a2, de.read_vec()?);
        assert_eq!(a3, de.read_vec()?);
        assert_eq!([1, 2, 3, 4], de.read_array::<4>()?);
        assert_eq!(0, de.remaining());

        Ok(())
    }

    #[test]
    fn test_leb128_len() -> Result<(), Error> {
        for n in [0_usize, 1, 127, 128, 300, 16_383, 16_384, 1 << 40] {
            let mut ser = Serializer::new();
            let written = ser.write_leb128_u64(n as u64)?;
            assert_eq!(written, to_leb128_len(n), "wrong length for {n}");
        }
        Ok(())
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() -> Result<(), Error> {
        let mut ser = Serializer::new();
        ser.write_leb128_u64(u64::from(u32::MAX))?;
        ser.write_array(b"short")?;
        let bytes = ser.finalize();
        let mut de = Deserializer::new(&bytes);
        assert!(matches!(de.read_vec(), Err(Error::Marshal(_))));
        Ok(())
    }

    #[test]
    fn test_count_is_bounded() -> Result<(), Error> {
        let mut ser = Serializer::new();
        ser.write_leb128_u64(1_000)?;
        let bytes = ser.finalize();
        assert!(Deserializer::new(&bytes).read_count(10).is_err());
        assert_eq!(1_000, Deserializer::new(&bytes).read_count(1_000)?);
        Ok(())
    }
}
