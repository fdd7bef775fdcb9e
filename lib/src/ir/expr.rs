use super::TypeName;
use std::hash::{Hash, Hasher};

/// Kind of a register, which decides how it is named and whether copies into it may be coalesced
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum LocalVarKind {
    /// Generated register (merge points, temporaries)
    Unknown,

    /// Register holding the result of a simulated instruction
    Original,

    /// Register named after a local variable debug table entry
    NamedLocal,
}

/// Symbolic register
///
/// Equality and hashing only look at the index and type: the name and kind are presentation
/// details which may be rewritten after construction.
#[derive(Clone, Debug)]
pub struct LocalVar {
    pub index: usize,
    pub name: String,
    pub type_name: TypeName,
    pub kind: LocalVarKind,
}

/// Prefix of the names of generated registers
pub const LOCAL_VAR_START_CHARACTER: char = '%';

impl LocalVar {
    pub fn new(index: usize, name: String, type_name: TypeName, kind: LocalVarKind) -> LocalVar {
        LocalVar {
            index,
            name,
            type_name,
            kind,
        }
    }

    /// Register named after its index
    pub fn generated(index: usize, type_name: TypeName) -> LocalVar {
        let name = format!("{}{}", LOCAL_VAR_START_CHARACTER, index);
        LocalVar::new(index, name, type_name, LocalVarKind::Unknown)
    }

    /// Does the register have a user facing name?
    pub fn is_named(&self) -> bool {
        !self.name.starts_with(LOCAL_VAR_START_CHARACTER)
    }

    pub fn with_type(&self, type_name: TypeName) -> LocalVar {
        LocalVar {
            type_name,
            ..self.clone()
        }
    }
}

impl PartialEq for LocalVar {
    fn eq(&self, other: &LocalVar) -> bool {
        self.index == other.index && self.type_name == other.type_name
    }
}

impl Eq for LocalVar {}

impl Hash for LocalVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.type_name.hash(state);
    }
}

/// Method parameter (not including `this`)
///
/// Like [`LocalVar`], the name does not participate in equality.
#[derive(Clone, Debug)]
pub struct Argument {
    pub index: usize,
    pub name: String,
    pub type_name: TypeName,
}

impl Argument {
    pub fn new(index: usize, name: Option<String>, type_name: TypeName) -> Argument {
        Argument {
            index,
            name: name.unwrap_or_else(|| format!("arg${}", index)),
            type_name,
        }
    }
}

impl PartialEq for Argument {
    fn eq(&self, other: &Argument) -> bool {
        self.index == other.index && self.type_name == other.type_name
    }
}

impl Eq for Argument {}

impl Hash for Argument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.type_name.hash(state);
    }
}

/// Reference to a method, as found in method handle constants
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodConstant {
    pub owner: TypeName,
    pub name: String,
    pub argument_types: Vec<TypeName>,
    pub return_type: TypeName,
}

/// Literal values
#[derive(Clone, Debug)]
pub enum Constant {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    String(String),

    /// `Foo.class`
    Class(TypeName),

    /// Method handle
    Method(MethodConstant),

    /// Method type
    MethodType {
        argument_types: Vec<TypeName>,
        return_type: TypeName,
    },
}

impl Constant {
    /// Zero value of a primitive type (`null` for everything else)
    pub fn zero(type_name: &TypeName) -> Constant {
        match type_name.as_str() {
            "boolean" => Constant::Bool(false),
            "byte" => Constant::Byte(0),
            "char" => Constant::Char(0),
            "short" => Constant::Short(0),
            "int" => Constant::Int(0),
            "long" => Constant::Long(0),
            "float" => Constant::Float(0.0),
            "double" => Constant::Double(0.0),
            _ => Constant::Null,
        }
    }

    pub fn type_name(&self) -> TypeName {
        match self {
            Constant::Bool(_) => TypeName::BOOLEAN,
            Constant::Byte(_) => TypeName::BYTE,
            Constant::Char(_) => TypeName::CHAR,
            Constant::Short(_) => TypeName::SHORT,
            Constant::Int(_) => TypeName::INT,
            Constant::Long(_) => TypeName::LONG,
            Constant::Float(_) => TypeName::FLOAT,
            Constant::Double(_) => TypeName::DOUBLE,
            Constant::Null => TypeName::NULL,
            Constant::String(_) => TypeName::STRING,
            Constant::Class(_) => TypeName::CLASS,
            Constant::Method(_) => TypeName::METHOD_HANDLE,
            Constant::MethodType { .. } => TypeName::METHOD_TYPE,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Byte(a), Constant::Byte(b)) => a == b,
            (Constant::Char(a), Constant::Char(b)) => a == b,
            (Constant::Short(a), Constant::Short(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (Constant::Null, Constant::Null) => true,
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::Class(a), Constant::Class(b)) => a == b,
            (Constant::Method(a), Constant::Method(b)) => a == b,
            (
                Constant::MethodType {
                    argument_types: a1,
                    return_type: r1,
                },
                Constant::MethodType {
                    argument_types: a2,
                    return_type: r2,
                },
            ) => a1 == a2 && r1 == r2,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Bool(b) => b.hash(state),
            Constant::Byte(b) => b.hash(state),
            Constant::Char(c) => c.hash(state),
            Constant::Short(s) => s.hash(state),
            Constant::Int(i) => i.hash(state),
            Constant::Long(l) => l.hash(state),
            Constant::Float(f) => f.to_bits().hash(state),
            Constant::Double(d) => d.to_bits().hash(state),
            Constant::Null => (),
            Constant::String(s) => s.hash(state),
            Constant::Class(c) => c.hash(state),
            Constant::Method(m) => m.hash(state),
            Constant::MethodType {
                argument_types,
                return_type,
            } => {
                argument_types.hash(state);
                return_type.hash(state);
            }
        }
    }
}

/// Instance or static field access
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// `None` for static fields
    pub instance: Option<Value>,
    pub owner: TypeName,
    pub name: String,
    pub type_name: TypeName,
}

/// Array element access
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayAccess {
    pub array: Value,
    pub index: Value,
    pub type_name: TypeName,
}

/// Operand of an expression
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    This(TypeName),
    Argument(Argument),
    Local(LocalVar),
    Constant(Constant),
    Field(Box<FieldRef>),
    ArrayAccess(Box<ArrayAccess>),
}

impl Value {
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::This(type_name) => type_name.clone(),
            Value::Argument(arg) => arg.type_name.clone(),
            Value::Local(local) => local.type_name.clone(),
            Value::Constant(constant) => constant.type_name(),
            Value::Field(field) => field.type_name.clone(),
            Value::ArrayAccess(access) => access.type_name.clone(),
        }
    }

    /// `this`, arguments, registers, and constants
    pub fn is_simple(&self) -> bool {
        !self.is_complex()
    }

    /// Field and array accesses, which may not be operands of other expressions
    pub fn is_complex(&self) -> bool {
        matches!(self, Value::Field(_) | Value::ArrayAccess(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn as_local(&self) -> Option<&LocalVar> {
        match self {
            Value::Local(local) => Some(local),
            _ => None,
        }
    }

    /// Values directly nested inside this one
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Value::Field(field) => field.instance.iter().collect(),
            Value::ArrayAccess(access) => vec![&access.array, &access.index],
            _ => vec![],
        }
    }
}

impl From<LocalVar> for Value {
    fn from(local: LocalVar) -> Value {
        Value::Local(local)
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Value {
        Value::Constant(constant)
    }
}

/// Binary operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BinaryOp {
    Add,
    And,
    Cmp,
    Cmpg,
    Cmpl,
    Div,
    Mul,
    Eq,
    Neq,
    Ge,
    Gt,
    Le,
    Lt,
    Or,
    Rem,
    Shl,
    Shr,
    Sub,
    Ushr,
    Xor,
}

impl BinaryOp {
    /// Operators that can be the condition of an `if`
    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Lt
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::And => "&",
            BinaryOp::Cmp => "cmp",
            BinaryOp::Cmpg => "cmpg",
            BinaryOp::Cmpl => "cmpl",
            BinaryOp::Div => "/",
            BinaryOp::Mul => "*",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Lt => "<",
            BinaryOp::Or => "|",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Sub => "-",
            BinaryOp::Ushr => "u<<",
            BinaryOp::Xor => "^",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub type_name: TypeName,
    pub lhv: Value,
    pub rhv: Value,
}

/// Dispatch mode of a method call
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
}

/// Call to a statically known method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodCall {
    pub kind: CallKind,
    pub owner: TypeName,
    pub name: String,
    pub argument_types: Vec<TypeName>,
    pub return_type: TypeName,

    /// Receiver (`None` exactly for static calls)
    pub instance: Option<Value>,
    pub args: Vec<Value>,

    /// Is the owner an interface (only tracked for static calls)
    pub is_interface: bool,
}

/// Field or method handle kind of a bootstrap method
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BsmHandleTag {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

/// Method handle passed to or used as a bootstrap method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BsmHandle {
    pub tag: BsmHandleTag,
    pub owner: TypeName,
    pub name: String,

    /// Empty for field handles
    pub argument_types: Vec<TypeName>,

    /// Field type for field handles
    pub return_type: TypeName,
    pub is_interface: bool,
}

/// Static argument of a bootstrap method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BsmArg {
    /// Numbers and strings
    Constant(Constant),
    Type(TypeName),
    MethodType {
        argument_types: Vec<TypeName>,
        return_type: TypeName,
    },
    Handle(BsmHandle),
}

/// `invokedynamic` call site
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DynamicCall {
    pub bsm: BsmHandle,
    pub bsm_args: Vec<BsmArg>,
    pub name: String,
    pub argument_types: Vec<TypeName>,
    pub return_type: TypeName,
    pub args: Vec<Value>,
}

impl DynamicCall {
    /// Is the call site bootstrapped by `LambdaMetafactory.metafactory`?
    pub fn is_lambda(&self) -> bool {
        self.bsm.owner == TypeName::LAMBDA_METAFACTORY && self.bsm.name == "metafactory"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallExpr {
    Method(MethodCall),
    Dynamic(DynamicCall),
}

impl CallExpr {
    pub fn return_type(&self) -> &TypeName {
        match self {
            CallExpr::Method(call) => &call.return_type,
            CallExpr::Dynamic(call) => &call.return_type,
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            CallExpr::Method(call) => call.instance.iter().chain(call.args.iter()).collect(),
            CallExpr::Dynamic(call) => call.args.iter().collect(),
        }
    }
}

/// Right hand side of an assignment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Binary(BinaryExpr),
    Neg {
        type_name: TypeName,
        operand: Value,
    },
    Length {
        array: Value,
    },
    Cast {
        type_name: TypeName,
        operand: Value,
    },
    InstanceOf {
        operand: Value,
        target: TypeName,
    },
    New(TypeName),
    NewArray {
        type_name: TypeName,
        dimensions: Vec<Value>,
    },
    Call(CallExpr),
    Value(Value),
}

impl Expr {
    pub fn type_name(&self) -> TypeName {
        match self {
            Expr::Binary(binary) => binary.type_name.clone(),
            Expr::Neg { type_name, .. }
            | Expr::Cast { type_name, .. }
            | Expr::New(type_name)
            | Expr::NewArray { type_name, .. } => type_name.clone(),
            Expr::Length { .. } => TypeName::INT,
            Expr::InstanceOf { .. } => TypeName::BOOLEAN,
            Expr::Call(call) => call.return_type().clone(),
            Expr::Value(value) => value.type_name(),
        }
    }

    /// Values directly nested inside this expression
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Expr::Binary(binary) => vec![&binary.lhv, &binary.rhv],
            Expr::Neg { operand, .. }
            | Expr::Cast { operand, .. }
            | Expr::InstanceOf { operand, .. } => vec![operand],
            Expr::Length { array } => vec![array],
            Expr::New(_) => vec![],
            Expr::NewArray { dimensions, .. } => dimensions.iter().collect(),
            Expr::Call(call) => call.operands(),
            Expr::Value(value) => value.operands(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Expr::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_local(&self) -> Option<&LocalVar> {
        self.as_value().and_then(Value::as_local)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Expr {
        Expr::Value(value)
    }
}

impl From<BinaryExpr> for Expr {
    fn from(binary: BinaryExpr) -> Expr {
        Expr::Binary(binary)
    }
}
