//! Typed primitives of the attribute file format.
//!
//! All multi-byte values are big-endian. Strings are UTF-16 code units
//! behind a 16-bit length prefix that distinguishes `None` (prefix 0) from
//! the empty string (prefix 1).

use std::io::{self, Read, Write};

use log::warn;

use crate::error::{CoreError, Result};
use crate::expr::ConstValue;
use crate::kind::Kind;
use crate::types::{Type, TypeTag};

pub struct AttributeOutput<W: Write> {
    sink: W,
    written: usize,
}

impl<W: Write> AttributeOutput<W> {
    pub fn new(sink: W) -> Self {
        AttributeOutput { sink, written: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.put(&[byte])
    }

    pub fn write_short(&mut self, value: i32) -> Result<()> {
        let short = i16::try_from(value).map_err(|_| CoreError::Range(value.into()))?;
        self.put(&short.to_be_bytes())
    }

    /// Non-negative count or line number stored as a short.
    pub fn write_count(&mut self, value: usize) -> Result<()> {
        let value = i32::try_from(value).map_err(|_| CoreError::Range(value as i64))?;
        self.write_short(value)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(u8::from(value))
    }

    pub fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        let Some(text) = value else {
            return self.write_short(0);
        };
        let units: Vec<u16> = text.encode_utf16().collect();
        let prefix = i32::try_from(units.len() + 1).map_err(|_| CoreError::Range(units.len() as i64 + 1))?;
        self.write_short(prefix)?;
        for unit in units {
            self.put(&unit.to_be_bytes())?;
        }
        Ok(())
    }

    pub fn write_kind_tag(&mut self, tag: i32) -> Result<()> {
        if !(0..=i32::from(Kind::MAX_TAG)).contains(&tag) {
            return Err(CoreError::protocol(format!("kind tag {tag} is out of range")));
        }
        self.write_byte(tag as u8)
    }

    pub fn write_kind(&mut self, kind: Kind) -> Result<()> {
        self.write_kind_tag(i32::from(kind.tag()))
    }

    pub fn write_type(&mut self, ty: &Type) -> Result<()> {
        self.write_byte(ty.tag() as u8)?;
        if let Type::Ref(ident) = ty {
            self.write_string(ident.as_deref())?;
        }
        Ok(())
    }

    pub fn write_constant(&mut self, value: &ConstValue) -> Result<()> {
        match value {
            ConstValue::Null => self.write_byte(TypeTag::Undefined as u8),
            ConstValue::Boolean(b) => {
                self.write_byte(TypeTag::Boolean as u8)?;
                self.write_bool(*b)
            }
            ConstValue::Character(c) => {
                let unit = u16::try_from(u32::from(*c)).map_err(|_| {
                    CoreError::UnsupportedConstant(format!("character U+{:04X} is outside the BMP", u32::from(*c)))
                })?;
                self.write_byte(TypeTag::Character as u8)?;
                self.put(&unit.to_be_bytes())
            }
            ConstValue::Integer(i) => {
                let narrowed = *i as i16;
                if i64::from(narrowed) != *i {
                    warn!("integer constant {i} narrowed to {narrowed} in attribute file");
                }
                self.write_byte(TypeTag::Integer as u8)?;
                self.put(&narrowed.to_be_bytes())
            }
            ConstValue::Real(r) => {
                self.write_byte(TypeTag::Real as u8)?;
                self.put(&r.to_bits().to_be_bytes())
            }
            ConstValue::LongReal(r) => {
                self.write_byte(TypeTag::LongReal as u8)?;
                self.put(&r.to_bits().to_be_bytes())
            }
            ConstValue::Text(t) => {
                self.write_byte(TypeTag::Text as u8)?;
                self.write_string(t.as_deref())
            }
        }
    }
}

pub struct AttributeInput<R: Read> {
    source: R,
}

impl<R: Read> AttributeInput<R> {
    pub fn new(source: R) -> Self {
        AttributeInput { source }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.source.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CoreError::Format("unexpected end of attribute file".into()),
            _ => CoreError::Io(e),
        })?;
        Ok(buf)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_short(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_count(&mut self) -> Result<usize> {
        let value = self.read_short()?;
        usize::try_from(value).map_err(|_| CoreError::protocol(format!("negative count {value}")))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CoreError::protocol(format!("boolean byte {other}"))),
        }
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let prefix = self.read_short()?;
        if prefix == 0 {
            return Ok(None);
        }
        if prefix < 0 {
            return Err(CoreError::protocol(format!("string length prefix {prefix}")));
        }
        let mut units = Vec::with_capacity(prefix as usize - 1);
        for _ in 1..prefix {
            units.push(u16::from_be_bytes(self.take()?));
        }
        String::from_utf16(&units)
            .map(Some)
            .map_err(|_| CoreError::protocol("string is not valid UTF-16"))
    }

    pub fn read_kind(&mut self) -> Result<Kind> {
        let tag = self.read_byte()?;
        Kind::from_tag(tag).ok_or_else(|| CoreError::protocol(format!("kind tag {tag} is out of range")))
    }

    fn read_type_tag(&mut self) -> Result<TypeTag> {
        let byte = self.read_byte()?;
        TypeTag::from_byte(byte).ok_or_else(|| CoreError::protocol(format!("type tag {byte}")))
    }

    pub fn read_type(&mut self) -> Result<Type> {
        let ty = match self.read_type_tag()? {
            TypeTag::Undefined => Type::Undefined,
            TypeTag::Boolean => Type::Boolean,
            TypeTag::Character => Type::Character,
            TypeTag::Integer => Type::Integer,
            TypeTag::Real => Type::Real,
            TypeTag::LongReal => Type::LongReal,
            TypeTag::Text => Type::Text,
            TypeTag::Ref => Type::Ref(self.read_string()?),
            TypeTag::Procedure => Type::Procedure,
            TypeTag::Label => Type::Label,
        };
        Ok(ty)
    }

    pub fn read_constant(&mut self) -> Result<ConstValue> {
        let value = match self.read_type_tag()? {
            TypeTag::Undefined => ConstValue::Null,
            TypeTag::Boolean => ConstValue::Boolean(self.read_bool()?),
            TypeTag::Character => {
                let unit = u16::from_be_bytes(self.take()?);
                let c = char::from_u32(u32::from(unit))
                    .ok_or_else(|| CoreError::protocol(format!("character constant {unit:#06x}")))?;
                ConstValue::Character(c)
            }
            TypeTag::Integer => ConstValue::Integer(i64::from(self.read_short()?)),
            TypeTag::Real => ConstValue::Real(f32::from_bits(u32::from_be_bytes(self.take()?))),
            TypeTag::LongReal => ConstValue::LongReal(f64::from_bits(u64::from_be_bytes(self.take()?))),
            TypeTag::Text => ConstValue::Text(self.read_string()?),
            other => {
                return Err(CoreError::UnsupportedConstant(format!("{other:?} constant")));
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn output() -> AttributeOutput<Vec<u8>> {
        AttributeOutput::new(Vec::new())
    }

    fn input(bytes: &[u8]) -> AttributeInput<&[u8]> {
        AttributeInput::new(bytes)
    }

    #[test]
    fn short_range_is_enforced() {
        let mut out = output();
        assert!(matches!(out.write_short(32768), Err(CoreError::Range(32768))));
        assert!(matches!(out.write_short(-32769), Err(CoreError::Range(-32769))));
        out.write_short(32767).unwrap();
        out.write_short(-32768).unwrap();

        let bytes = out.into_inner();
        assert_eq!(bytes, vec![0x7f, 0xff, 0x80, 0x00]);
        let mut inp = input(&bytes);
        assert_eq!(inp.read_short().unwrap(), 32767);
        assert_eq!(inp.read_short().unwrap(), -32768);
    }

    #[test]
    fn null_and_empty_strings_differ() {
        let mut out = output();
        out.write_string(None).unwrap();
        out.write_string(Some("")).unwrap();
        let bytes = out.into_inner();
        assert_eq!(bytes, vec![0, 0, 0, 1]);

        let mut inp = input(&bytes);
        assert_eq!(inp.read_string().unwrap(), None);
        assert_eq!(inp.read_string().unwrap(), Some(String::new()));
    }

    #[test]
    fn strings_are_utf16_code_units() {
        let mut out = output();
        out.write_string(Some("Aé")).unwrap();
        assert_eq!(out.into_inner(), vec![0, 3, 0x00, 0x41, 0x00, 0xe9]);
    }

    #[test]
    fn kind_tags_are_validated() {
        let mut out = output();
        assert!(matches!(out.write_kind_tag(-1), Err(CoreError::Protocol(_))));
        assert!(matches!(
            out.write_kind_tag(i32::from(Kind::MAX_TAG) + 1),
            Err(CoreError::Protocol(_))
        ));
        out.write_kind(Kind::TypeConversion).unwrap();
        assert!(matches!(input(&[Kind::MAX_TAG + 1]).read_kind(), Err(CoreError::Protocol(_))));
        assert_eq!(input(&out.into_inner()).read_kind().unwrap(), Kind::TypeConversion);
    }

    #[test]
    fn integer_constants_are_narrowed_to_sixteen_bits() {
        let mut out = output();
        out.write_constant(&ConstValue::Integer(70000)).unwrap();
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 3);
        assert_eq!(
            input(&bytes).read_constant().unwrap(),
            ConstValue::Integer(i64::from(70000i64 as i16))
        );
    }

    #[test]
    fn constants_carry_their_tag() {
        let values = [
            ConstValue::Null,
            ConstValue::Boolean(true),
            ConstValue::Character('Z'),
            ConstValue::Integer(-12),
            ConstValue::Real(1.5),
            ConstValue::LongReal(-2.25),
            ConstValue::Text(Some("hi".into())),
            ConstValue::Text(None),
        ];
        let mut out = output();
        for v in &values {
            out.write_constant(v).unwrap();
        }
        let bytes = out.into_inner();
        let mut inp = input(&bytes);
        for v in &values {
            assert_eq!(&inp.read_constant().unwrap(), v);
        }
        // undefined tag without payload
        assert_eq!(bytes[0], 0);
    }

    #[test]
    fn characters_outside_the_bmp_are_unsupported() {
        let err = output().write_constant(&ConstValue::Character('\u{1F600}')).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedConstant(_)));
    }

    #[test]
    fn truncated_input_is_a_format_error() {
        assert!(matches!(input(&[0, 5, 0]).read_string(), Err(CoreError::Format(_))));
        assert!(matches!(input(&[2]).read_bool(), Err(CoreError::Protocol(_))));
    }

    #[test]
    fn reference_types_carry_the_qualification() {
        let mut out = output();
        out.write_type(&Type::reference("HEAD")).unwrap();
        out.write_type(&Type::none()).unwrap();
        out.write_type(&Type::LongReal).unwrap();
        let bytes = out.into_inner();
        let mut inp = input(&bytes);
        assert_eq!(inp.read_type().unwrap(), Type::reference("head"));
        assert_eq!(inp.read_type().unwrap(), Type::none());
        assert_eq!(inp.read_type().unwrap(), Type::LongReal);
    }

    proptest! {
        #[test]
        fn shorts_in_range_round_trip(v in -32768i32..=32767) {
            let mut out = output();
            out.write_short(v).unwrap();
            let bytes = out.into_inner();
            prop_assert_eq!(i32::from(input(&bytes).read_short().unwrap()), v);
        }

        #[test]
        fn shorts_out_of_range_fail(v in prop_oneof![i32::MIN..-32768, 32768..=i32::MAX]) {
            prop_assert!(matches!(output().write_short(v), Err(CoreError::Range(_))));
        }

        #[test]
        fn strings_round_trip(s in proptest::option::of("\\PC{0,64}")) {
            let mut out = output();
            out.write_string(s.as_deref()).unwrap();
            let bytes = out.into_inner();
            prop_assert_eq!(input(&bytes).read_string().unwrap(), s);
        }
    }
}
