use super::{BinaryName, Name};
use crate::util::Width;
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Source-level keyword for the type
    pub const fn java_name(&self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Byte
            | BaseType::Char
            | BaseType::Float
            | BaseType::Int
            | BaseType::Short
            | BaseType::Boolean => 1,
            BaseType::Double | BaseType::Long => 2,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                let msg = format!("Invalid base type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing base type character";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        };
        Ok(typ)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T> ArrayType<T> {
    /// Total number of dimensions in the array type
    ///
    /// This is always just `additional_dimensions + 1`
    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if let Some('L') = source.next() {
            let mut class_name = String::new();
            loop {
                let c: char = source.next().ok_or_else(|| {
                    let msg = format!("Missing terminator for 'L{}'", class_name);
                    Error::new(ErrorKind::UnexpectedEof, msg)
                })?;
                if c == ';' {
                    return BinaryName::from_string(class_name)
                        .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg));
                } else {
                    class_name.push(c)
                }
            }
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                "Expected object type to start with `L`",
            ))
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for RefType<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        Ok(match source.peek().copied() {
            Some('L') => RefType::Object(C::parse_from(source)?),
            Some('[') => {
                source.next();
                let mut additional_dimensions = 0;
                while source.next_if_eq(&'[').is_some() {
                    additional_dimensions += 1;
                }
                if let Some('L') = source.peek().copied() {
                    RefType::ObjectArray(ArrayType {
                        additional_dimensions,
                        element_type: C::parse_from(source)?,
                    })
                } else {
                    RefType::PrimitiveArray(ArrayType {
                        additional_dimensions,
                        element_type: BaseType::parse_from(source)?,
                    })
                }
            }
            Some(c) => {
                let msg = format!("Invalid reference type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing field type";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        })
    }
}

impl RefType<BinaryName> {
    /// Parse the operand of `new`, `anewarray`, `checkcast`, `instanceof`, or a stack map
    /// frame object entry: either an internal class name or an array descriptor
    pub fn parse_internal(name: &str) -> Result<Self> {
        if name.starts_with('[') {
            RefType::parse(name)
        } else {
            BinaryName::from_string(name.to_owned())
                .map(RefType::Object)
                .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg))
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn double() -> FieldType<C> {
        FieldType::Base(BaseType::Double)
    }

    pub const fn boolean() -> FieldType<C> {
        FieldType::Base(BaseType::Boolean)
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => {
                let msg = format!("Invalid field type character '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,
    pub return_type: Option<FieldType<Class>>, // `None` is for `void` (ie. no return)
}

impl<C> MethodDescriptor<C> {
    /// Total length of parameters in local variable slots (not the same as the length of the
    /// vector)
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = usize::from(has_this_param);
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next_if_eq(&'(').is_none() {
            let msg = "Expected '(' for method";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }

        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            parameters.push(FieldType::<C>::parse_from(source)?);
        }

        if source.next_if_eq(&')').is_none() {
            let msg = "Expected ')' for method";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }

        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::<C>::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    type FT = FieldType<BinaryName>;

    const INT: FT = FieldType::Base(BaseType::Int);
    const DOUBLE: FT = FieldType::Base(BaseType::Double);
    const OBJECT: FT = FieldType::object(BinaryName::OBJECT);
    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn field_types() {
        round_trip("I", INT);
        round_trip("Ljava/lang/Object;", OBJECT);
        round_trip(
            "[[[D",
            FieldType::Ref(RefType::<BinaryName>::PrimitiveArray(ArrayType {
                additional_dimensions: 2,
                element_type: BaseType::Double,
            })),
        );
        round_trip(
            "[Ljava/lang/String;",
            FieldType::Ref(RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type: BinaryName::STRING,
            })),
        );
    }

    #[test]
    fn method_descriptors() {
        let desc = MethodDescriptor {
            parameters: vec![INT, DOUBLE, STRING],
            return_type: Some(OBJECT),
        };
        round_trip("(IDLjava/lang/String;)Ljava/lang/Object;", desc.clone());
        assert_eq!(desc.parameter_length(true), 5);
        assert_eq!(desc.parameter_length(false), 4);
    }

    #[test]
    fn bad_descriptors() {
        assert!(FT::parse("Q").is_err());
        assert!(FT::parse("Ljava/lang/Object").is_err());
        assert!(MethodDescriptor::<BinaryName>::parse("(I").is_err());
        assert!(FT::parse("II").is_err());
    }

    #[test]
    fn internal_names() {
        assert_eq!(
            RefType::parse_internal("java/lang/String").unwrap(),
            RefType::Object(BinaryName::STRING)
        );
        assert!(matches!(
            RefType::parse_internal("[I").unwrap(),
            RefType::PrimitiveArray(_)
        ));
    }
}
