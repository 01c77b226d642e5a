//! Argument packets exchanged with the peer.

use crate::function::Function;

/// Upper bound on a serialized packet, header included.
pub const MAX_PACKET: usize = 1024;

/// One packet: four typed argument groups in fixed wire order.
///
/// Outbound, `longs[0]` is the function code. Inbound, `longs[0]` is the
/// peer's status code. The trailing `array` carries raw words or a packed
/// string (see [`crate::text`]); its length travels as an extra long
/// argument, which the codec adds and strips so it never appears here.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// 32-bit integer arguments.
    pub longs: Vec<i32>,
    /// Boolean arguments, each sent as a 32-bit integer.
    pub bools: Vec<bool>,
    /// 64-bit float arguments.
    pub doubles: Vec<f64>,
    /// Trailing variable-length word array.
    pub array: Vec<i32>,
}

impl Message {
    /// Starts an outbound message addressed to `function`.
    pub fn call(function: Function) -> Self {
        Self {
            longs: vec![function.code()],
            ..Self::default()
        }
    }

    /// Builds a message from raw argument groups.
    pub const fn from_parts(
        longs: Vec<i32>,
        bools: Vec<bool>,
        doubles: Vec<f64>,
        array: Vec<i32>,
    ) -> Self {
        Self {
            longs,
            bools,
            doubles,
            array,
        }
    }

    /// Appends long arguments.
    #[must_use]
    pub fn longs(mut self, args: impl IntoIterator<Item = i32>) -> Self {
        self.longs.extend(args);
        self
    }

    /// Appends bool arguments.
    #[must_use]
    pub fn bools(mut self, args: impl IntoIterator<Item = bool>) -> Self {
        self.bools.extend(args);
        self
    }

    /// Appends double arguments.
    #[must_use]
    pub fn doubles(mut self, args: impl IntoIterator<Item = f64>) -> Self {
        self.doubles.extend(args);
        self
    }

    /// Sets the trailing word array.
    #[must_use]
    pub fn array(mut self, words: Vec<i32>) -> Self {
        self.array = words;
        self
    }

    /// Leading long argument: function code outbound, status inbound.
    pub fn head(&self) -> i32 {
        self.longs.first().copied().unwrap_or_default()
    }

    /// Long argument at `index`, zero when absent.
    pub fn long(&self, index: usize) -> i32 {
        self.longs.get(index).copied().unwrap_or_default()
    }

    /// Bool argument at `index`, `false` when absent.
    pub fn flag(&self, index: usize) -> bool {
        self.bools.get(index).copied().unwrap_or_default()
    }

    /// Double argument at `index`, zero when absent.
    pub fn double(&self, index: usize) -> f64 {
        self.doubles.get(index).copied().unwrap_or_default()
    }

    /// Shape this message occupies on the wire.
    pub fn shape(&self) -> Shape {
        Shape {
            longs: self.longs.len(),
            bools: self.bools.len(),
            doubles: self.doubles.len(),
            array: self.array.len(),
        }
    }
}

/// Argument counts per group.
///
/// The wire format carries no type tags, so a receiver must declare the
/// shape it expects before reading a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[non_exhaustive]
pub struct Shape {
    /// Long arguments, excluding the implicit array length.
    pub longs: usize,
    /// Bool arguments.
    pub bools: usize,
    /// Double arguments.
    pub doubles: usize,
    /// Words in the trailing array.
    pub array: usize,
}

impl Shape {
    /// Response carrying only the status code.
    pub const STATUS: Self = Self::new(1, 0, 0);

    /// Shape with no trailing array.
    pub const fn new(longs: usize, bools: usize, doubles: usize) -> Self {
        Self {
            longs,
            bools,
            doubles,
            array: 0,
        }
    }

    /// Same shape with a trailing array of `words` words.
    #[must_use]
    pub const fn with_array(mut self, words: usize) -> Self {
        self.array = words;
        self
    }

    /// Long slots actually present on the wire.
    pub const fn wire_longs(&self) -> usize {
        self.longs + if self.array > 0 { 1 } else { 0 }
    }

    /// Serialized size in bytes, header included.
    pub const fn byte_len(&self) -> usize {
        4 + 4 * self.wire_longs() + 4 * self.bools + 8 * self.doubles + 4 * self.array
    }
}
