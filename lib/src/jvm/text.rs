//! Plain-text listings of method bodies
//!
//! A listing holds one or more methods. Each method starts with a header line and ends with
//! `end`. In between, every line is one node of the instruction stream or one directive:
//!
//! ```text
//! // Comments run to the end of the line
//! method public static com/acme/Util.clamp(III)I
//!   params value low high
//!   local value I start done 0
//!   try start done handler java/lang/RuntimeException
//! start:
//!   line 12 start
//!   iload 0
//!   iload 1
//!   if_icmpge above
//!   iload 1
//!   ireturn
//! above:
//!   frame same
//!   iload 0
//!   ireturn
//! done:
//! handler:
//!   frame same1 java/lang/RuntimeException
//!   athrow
//! end
//! ```
//!
//! Instructions use their `javap` mnemonics, with operands written as follows:
//!
//!   - local slots, `bipush`/`sipush` values, and `iinc` deltas are decimal integers
//!   - fields are `owner.name:descriptor` and methods `owner.name(descriptor)`, optionally
//!     followed by `itf` when the owner is an interface
//!   - class operands are internal names (`java/lang/String`) or array descriptors (`[I`)
//!   - `ldc` constants are `12`, `12L`, `1.5f`, `1.5`/`1.5d`, `"text"`, `class <type>`,
//!     `methodtype <descriptor>`, `handle <handle>`, or
//!     `dynamic name:descriptor <handle> { <constant>* }`
//!   - handles are `kind:owner.name:descriptor` where `kind` is the lowercase reference kind
//!     (`invokestatic`, `getfield`, `newinvokespecial`, ...)
//!   - `invokedynamic name(descriptor) <handle> <constant>*`
//!   - `tableswitch low default target*` and `lookupswitch default key:target*`
//!
//! Stack map frames are `frame full|new <local>* [| <stack>*]`, `frame append <local>*`,
//! `frame chop <count>`, `frame same`, or `frame same1 <stack>`. Verification types are `top`,
//! `int`, `float`, `long`, `double`, `null`, `uninit_this`, `uninit:<label>`, or a class
//! operand.

use super::*;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Parse every method of a listing
pub fn parse_methods(source: &str) -> Result<Vec<MethodBody>> {
    let mut methods: Vec<MethodBody> = vec![];
    let mut current: Option<MethodParser> = None;
    let mut last_line = 0;

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        last_line = line;
        let tokens = tokenize(text).map_err(|message| Error::Parse { line, message })?;
        let mut operands = Operands::new(line, &tokens);
        let head = match operands.next() {
            None => continue,
            Some(Token::Str(_)) => return Err(operands.error("Expected a keyword, found a string")),
            Some(Token::Word(word)) => word.as_str(),
        };

        if head == "method" {
            if current.is_some() {
                return Err(operands.error("Method is missing its 'end'"));
            }
            current = Some(MethodParser::header(&mut operands)?);
            continue;
        }

        if head == "end" {
            operands.finish()?;
            match current.take() {
                Some(method) => methods.push(method.finish()),
                None => return Err(operands.error("'end' outside of a method")),
            }
            continue;
        }

        match current.as_mut() {
            Some(method) => method.parse_line(head, &mut operands)?,
            None => return Err(operands.error(format!("Expected 'method', found '{}'", head))),
        }
    }

    if current.is_some() {
        return Err(Error::Parse {
            line: last_line,
            message: String::from("Method is missing its 'end'"),
        });
    }
    Ok(methods)
}

/// Parse a listing holding exactly one method
pub fn parse_method(source: &str) -> Result<MethodBody> {
    let mut methods = parse_methods(source)?;
    match methods.len() {
        1 => Ok(methods.remove(0)),
        count => Err(Error::Parse {
            line: 1,
            message: format!("Expected exactly one method, found {}", count),
        }),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Str(String),
}

fn tokenize(line: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = vec![];
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut string = String::new();
            loop {
                match chars.next() {
                    None => return Err(String::from("Unterminated string literal")),
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('0') => string.push('\0'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some(other) => return Err(format!("Unknown escape '\\{}'", other)),
                        None => return Err(String::from("Unterminated string literal")),
                    },
                    Some(other) => string.push(other),
                }
            }
            tokens.push(Token::Str(string));
        } else if line_comment_starts(&chars) {
            break;
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

fn line_comment_starts(chars: &std::iter::Peekable<std::str::Chars>) -> bool {
    let mut lookahead = chars.clone();
    lookahead.next() == Some('/') && lookahead.next() == Some('/')
}

/// Remaining tokens of one line
struct Operands<'t> {
    line: usize,
    tokens: std::slice::Iter<'t, Token>,
}

impl<'t> Operands<'t> {
    fn new(line: usize, tokens: &'t [Token]) -> Operands<'t> {
        Operands {
            line,
            tokens: tokens.iter(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Option<&'t Token> {
        self.tokens.next()
    }

    fn peek_word(&self) -> Option<&'t str> {
        match self.tokens.clone().next() {
            Some(Token::Word(word)) => Some(word.as_str()),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.tokens.len() == 0
    }

    fn word(&mut self, what: &str) -> Result<&'t str> {
        match self.tokens.next() {
            Some(Token::Word(word)) => Ok(word.as_str()),
            Some(Token::Str(string)) => Err(self.error(format!(
                "Expected {}, found string \"{}\"",
                what, string
            ))),
            None => Err(self.error(format!("Expected {}", what))),
        }
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let word = self.word(what)?;
        word.parse::<T>().map_err(|_| {
            self.error(format!(
                "Operand '{}' is not a valid {} ({})",
                word,
                what,
                std::any::type_name::<T>()
            ))
        })
    }

    fn finish(&self) -> Result<()> {
        match self.tokens.clone().next() {
            None => Ok(()),
            Some(Token::Word(word)) => Err(self.error(format!("Unexpected operand '{}'", word))),
            Some(Token::Str(string)) => {
                Err(self.error(format!("Unexpected operand \"{}\"", string)))
            }
        }
    }

    fn binary_name(&self, name: &str) -> Result<BinaryName> {
        BinaryName::from_string(name.to_owned()).map_err(|message| self.error(message))
    }

    fn unqualified_name(&self, name: &str) -> Result<UnqualifiedName> {
        UnqualifiedName::from_string(name.to_owned()).map_err(|message| self.error(message))
    }

    fn ref_type(&mut self) -> Result<RefType<BinaryName>> {
        let name = self.word("a class or array type")?;
        RefType::parse_internal(name).map_err(|err| Error::bad_descriptor(name, err))
    }

    fn field_descriptor(&self, descriptor: &str) -> Result<FieldType<BinaryName>> {
        FieldType::parse(descriptor).map_err(|err| Error::bad_descriptor(descriptor, err))
    }

    fn method_descriptor(&self, descriptor: &str) -> Result<MethodDescriptor<BinaryName>> {
        MethodDescriptor::parse(descriptor).map_err(|err| Error::bad_descriptor(descriptor, err))
    }

    /// `owner.name:descriptor`
    fn field_ref(&mut self) -> Result<FieldRef> {
        let word = self.word("a field reference")?;
        let (member, descriptor) = word
            .split_once(':')
            .ok_or_else(|| self.error(format!("Field '{}' has no descriptor", word)))?;
        let (owner, name) = member
            .rsplit_once('.')
            .ok_or_else(|| self.error(format!("Field '{}' has no owner", word)))?;
        Ok(FieldRef {
            owner: self.binary_name(owner)?,
            name: self.unqualified_name(name)?,
            descriptor: self.field_descriptor(descriptor)?,
        })
    }

    /// `owner.name(descriptor) [itf]`
    fn method_ref(&mut self, interface_owner: bool) -> Result<MethodRef> {
        let word = self.word("a method reference")?;
        let paren = word
            .find('(')
            .ok_or_else(|| self.error(format!("Method '{}' has no descriptor", word)))?;
        let (owner, name) = word[..paren]
            .rsplit_once('.')
            .ok_or_else(|| self.error(format!("Method '{}' has no owner", word)))?;
        let owner = RefType::parse_internal(owner).map_err(|err| Error::bad_descriptor(owner, err))?;
        let name = self.unqualified_name(name)?;
        let descriptor = self.method_descriptor(&word[paren..])?;

        let is_interface = if self.peek_word() == Some("itf") {
            self.next();
            true
        } else {
            interface_owner
        };
        Ok(MethodRef {
            owner,
            name,
            descriptor,
            is_interface,
        })
    }

    /// `kind:owner.name:descriptor`
    fn handle(&mut self) -> Result<Handle> {
        let word = self.word("a method handle")?;
        let malformed = || self.error(format!("Malformed method handle '{}'", word));
        let (kind, rest) = word.split_once(':').ok_or_else(malformed)?;
        let (member, descriptor) = rest.split_once(':').ok_or_else(malformed)?;
        let (owner, name) = member.rsplit_once('.').ok_or_else(malformed)?;

        let kind = match kind {
            "getfield" => HandleKind::GetField,
            "getstatic" => HandleKind::GetStatic,
            "putfield" => HandleKind::PutField,
            "putstatic" => HandleKind::PutStatic,
            "invokevirtual" => HandleKind::InvokeVirtual,
            "invokestatic" => HandleKind::InvokeStatic,
            "invokespecial" => HandleKind::InvokeSpecial,
            "newinvokespecial" => HandleKind::NewInvokeSpecial,
            "invokeinterface" => HandleKind::InvokeInterface,
            other => return Err(self.error(format!("Unknown method handle kind '{}'", other))),
        };
        let descriptor = if kind.is_field() {
            HandleDescriptor::Field(self.field_descriptor(descriptor)?)
        } else {
            HandleDescriptor::Method(self.method_descriptor(descriptor)?)
        };

        Ok(Handle {
            kind,
            owner: self.binary_name(owner)?,
            name: self.unqualified_name(name)?,
            descriptor,
            is_interface: kind == HandleKind::InvokeInterface,
        })
    }

    fn constant(&mut self) -> Result<LdcConstant> {
        let word = match self.next() {
            None => return Err(self.error("Expected a constant")),
            Some(Token::Str(string)) => return Ok(LdcConstant::String(string.clone())),
            Some(Token::Word(word)) => word.as_str(),
        };

        match word {
            "class" => Ok(LdcConstant::Class(self.ref_type()?)),
            "methodtype" => {
                let descriptor = self.word("a method descriptor")?;
                Ok(LdcConstant::MethodType(self.method_descriptor(descriptor)?))
            }
            "handle" => Ok(LdcConstant::MethodHandle(self.handle()?)),
            "dynamic" => {
                let signature = self.word("a dynamic constant name and descriptor")?;
                let (name, descriptor) = signature.split_once(':').ok_or_else(|| {
                    self.error(format!("Dynamic constant '{}' has no descriptor", signature))
                })?;
                let name = self.unqualified_name(name)?;
                let descriptor = self.field_descriptor(descriptor)?;
                let bootstrap = self.handle()?;

                let mut bootstrap_args = vec![];
                if self.peek_word() == Some("{") {
                    self.next();
                    while self.peek_word() != Some("}") {
                        if self.is_empty() {
                            return Err(self.error("Unterminated dynamic constant arguments"));
                        }
                        bootstrap_args.push(self.constant()?);
                    }
                    self.next();
                }

                Ok(LdcConstant::Dynamic(Box::new(ConstantDynamic {
                    name,
                    descriptor,
                    bootstrap,
                    bootstrap_args,
                })))
            }
            number => self.number_constant(number),
        }
    }

    fn number_constant(&self, word: &str) -> Result<LdcConstant> {
        let invalid = || self.error(format!("Invalid constant '{}'", word));
        if let Some(long) = word.strip_suffix('L') {
            long.parse().map(LdcConstant::Long).map_err(|_| invalid())
        } else if let Some(float) = word.strip_suffix('f') {
            float.parse().map(LdcConstant::Float).map_err(|_| invalid())
        } else if let Some(double) = word.strip_suffix('d') {
            double.parse().map(LdcConstant::Double).map_err(|_| invalid())
        } else if word.contains(&['.', 'e', 'E'][..]) {
            word.parse().map(LdcConstant::Double).map_err(|_| invalid())
        } else {
            word.parse().map(LdcConstant::Integer).map_err(|_| invalid())
        }
    }
}

/// Label names of one method
#[derive(Default)]
struct Labels {
    names: HashMap<String, SynLabel>,
    placed: HashSet<SynLabel>,
}

impl Labels {
    fn get(&mut self, name: &str) -> SynLabel {
        let next = SynLabel(self.names.len());
        *self.names.entry(name.to_owned()).or_insert(next)
    }
}

struct MethodParser {
    info: MethodInfo,
    labels: Labels,
    nodes: Vec<Insn>,
    try_catch: Vec<TryCatch>,
    local_variables: Vec<LocalVariable>,
}

impl MethodParser {
    /// `method <flag>* owner.name(descriptor)`
    fn header(operands: &mut Operands) -> Result<MethodParser> {
        let mut words: Vec<&str> = vec![];
        while !operands.is_empty() {
            words.push(operands.word("a method flag or signature")?);
        }
        let signature = words
            .pop()
            .ok_or_else(|| operands.error("Expected a method signature"))?;

        let mut access_flags = MethodAccessFlags::empty();
        for flag in words {
            access_flags |= MethodAccessFlags::from_keyword(flag)
                .ok_or_else(|| operands.error(format!("Unknown method flag '{}'", flag)))?;
        }

        let paren = signature
            .find('(')
            .ok_or_else(|| operands.error(format!("Method '{}' has no descriptor", signature)))?;
        let (owner, name) = signature[..paren]
            .rsplit_once('.')
            .ok_or_else(|| operands.error(format!("Method '{}' has no owner", signature)))?;
        let descriptor = operands.method_descriptor(&signature[paren..])?;
        let parameter_names = vec![None; descriptor.parameters.len()];

        Ok(MethodParser {
            info: MethodInfo {
                owner: operands.binary_name(owner)?,
                name: operands.unqualified_name(name)?,
                descriptor,
                access_flags,
                parameter_names,
            },
            labels: Labels::default(),
            nodes: vec![],
            try_catch: vec![],
            local_variables: vec![],
        })
    }

    fn finish(self) -> MethodBody {
        MethodBody {
            info: self.info,
            nodes: self.nodes,
            try_catch: self.try_catch,
            local_variables: self.local_variables,
        }
    }

    fn label(&mut self, operands: &mut Operands) -> Result<SynLabel> {
        let name = operands.word("a label")?;
        Ok(self.labels.get(name))
    }

    fn parse_line(&mut self, head: &str, operands: &mut Operands) -> Result<()> {
        if let Some(name) = head.strip_suffix(':') {
            let label = self.labels.get(name);
            if !self.labels.placed.insert(label) {
                return Err(operands.error(format!("Label '{}' is placed twice", name)));
            }
            self.nodes.push(Insn::Label(label));
            return operands.finish();
        }

        match head {
            "params" => {
                let mut names = vec![];
                while !operands.is_empty() {
                    let name = operands.word("a parameter name")?;
                    names.push(if name == "_" {
                        None
                    } else {
                        Some(operands.unqualified_name(name)?)
                    });
                }
                if names.len() != self.info.descriptor.parameters.len() {
                    return Err(operands.error(format!(
                        "Expected {} parameter names, found {}",
                        self.info.descriptor.parameters.len(),
                        names.len()
                    )));
                }
                self.info.parameter_names = names;
            }
            "try" => {
                let start = self.label(operands)?;
                let end = self.label(operands)?;
                let handler = self.label(operands)?;
                let catch_type = match operands.next() {
                    None => None,
                    Some(Token::Word(word)) if word == "any" => None,
                    Some(Token::Word(word)) => Some(operands.binary_name(word)?),
                    Some(Token::Str(_)) => return Err(operands.error("Expected a class name")),
                };
                self.try_catch.push(TryCatch {
                    start,
                    end,
                    handler,
                    catch_type,
                });
            }
            "local" => {
                let name = operands.word("a local variable name")?;
                let name = operands.unqualified_name(name)?;
                let descriptor = operands.word("a field descriptor")?;
                let descriptor = operands.field_descriptor(descriptor)?;
                let start = self.label(operands)?;
                let end = self.label(operands)?;
                let index = operands.number("local variable slot")?;
                self.local_variables.push(LocalVariable {
                    name,
                    descriptor,
                    start,
                    end,
                    index,
                });
            }
            "line" => {
                let line = operands.number("line number")?;
                let start = self.label(operands)?;
                self.nodes.push(Insn::LineNumber { line, start });
            }
            "frame" => {
                let frame = self.frame(operands)?;
                self.nodes.push(Insn::Frame(frame));
            }
            opcode => {
                let insn = self.instruction(opcode, operands)?;
                self.nodes.push(insn);
            }
        }
        operands.finish()
    }

    fn verification_type(&mut self, operands: &mut Operands) -> Result<VerificationType> {
        let word = operands.word("a verification type")?;
        Ok(match word {
            "top" => VerificationType::Top,
            "int" => VerificationType::Integer,
            "float" => VerificationType::Float,
            "long" => VerificationType::Long,
            "double" => VerificationType::Double,
            "null" => VerificationType::Null,
            "uninit_this" => VerificationType::UninitializedThis,
            other => match other.strip_prefix("uninit:") {
                Some(label) => VerificationType::Uninitialized(self.labels.get(label)),
                None => VerificationType::Object(
                    RefType::parse_internal(other)
                        .map_err(|err| Error::bad_descriptor(other, err))?,
                ),
            },
        })
    }

    fn frame(&mut self, operands: &mut Operands) -> Result<FrameNode> {
        let kind = match operands.word("a frame kind")? {
            "full" => FrameKind::Full,
            "new" => FrameKind::New,
            "append" => FrameKind::Append,
            "chop" => FrameKind::Chop,
            "same" => FrameKind::Same,
            "same1" => FrameKind::Same1,
            other => return Err(operands.error(format!("Unknown frame kind '{}'", other))),
        };

        let mut locals = vec![];
        let mut stack = vec![];
        let mut chopped = 0;
        match kind {
            FrameKind::Full | FrameKind::New => {
                while !operands.is_empty() && operands.peek_word() != Some("|") {
                    locals.push(self.verification_type(operands)?);
                }
                if operands.peek_word() == Some("|") {
                    operands.next();
                    while !operands.is_empty() {
                        stack.push(self.verification_type(operands)?);
                    }
                }
            }
            FrameKind::Append => {
                while !operands.is_empty() {
                    locals.push(self.verification_type(operands)?);
                }
            }
            FrameKind::Chop => chopped = operands.number("chopped local count")?,
            FrameKind::Same => (),
            FrameKind::Same1 => stack.push(self.verification_type(operands)?),
        }

        Ok(FrameNode {
            kind,
            locals,
            stack,
            chopped,
        })
    }

    fn instruction(&mut self, opcode: &str, operands: &mut Operands) -> Result<Insn> {
        use Instruction as I;

        let simple = match opcode {
            "nop" => I::Nop,
            "aconst_null" => I::AConstNull,
            "iconst_m1" => I::IConstM1,
            "iconst_0" => I::IConst0,
            "iconst_1" => I::IConst1,
            "iconst_2" => I::IConst2,
            "iconst_3" => I::IConst3,
            "iconst_4" => I::IConst4,
            "iconst_5" => I::IConst5,
            "lconst_0" => I::LConst0,
            "lconst_1" => I::LConst1,
            "fconst_0" => I::FConst0,
            "fconst_1" => I::FConst1,
            "fconst_2" => I::FConst2,
            "dconst_0" => I::DConst0,
            "dconst_1" => I::DConst1,
            "bipush" => I::BiPush(operands.number("byte")?),
            "sipush" => I::SiPush(operands.number("short")?),
            "ldc" | "ldc_w" | "ldc2_w" => I::Ldc(operands.constant()?),
            "iload" => I::ILoad(operands.number("local variable slot")?),
            "lload" => I::LLoad(operands.number("local variable slot")?),
            "fload" => I::FLoad(operands.number("local variable slot")?),
            "dload" => I::DLoad(operands.number("local variable slot")?),
            "aload" => I::ALoad(operands.number("local variable slot")?),
            "iaload" => I::IALoad,
            "laload" => I::LALoad,
            "faload" => I::FALoad,
            "daload" => I::DALoad,
            "aaload" => I::AALoad,
            "baload" => I::BALoad,
            "caload" => I::CALoad,
            "saload" => I::SALoad,
            "istore" => I::IStore(operands.number("local variable slot")?),
            "lstore" => I::LStore(operands.number("local variable slot")?),
            "fstore" => I::FStore(operands.number("local variable slot")?),
            "dstore" => I::DStore(operands.number("local variable slot")?),
            "astore" => I::AStore(operands.number("local variable slot")?),
            "iastore" => I::IAStore,
            "lastore" => I::LAStore,
            "fastore" => I::FAStore,
            "dastore" => I::DAStore,
            "aastore" => I::AAStore,
            "bastore" => I::BAStore,
            "castore" => I::CAStore,
            "sastore" => I::SAStore,
            "pop" => I::Pop,
            "pop2" => I::Pop2,
            "dup" => I::Dup,
            "dup_x1" => I::DupX1,
            "dup_x2" => I::DupX2,
            "dup2" => I::Dup2,
            "dup2_x1" => I::Dup2X1,
            "dup2_x2" => I::Dup2X2,
            "swap" => I::Swap,
            "iadd" => I::IAdd,
            "ladd" => I::LAdd,
            "fadd" => I::FAdd,
            "dadd" => I::DAdd,
            "isub" => I::ISub,
            "lsub" => I::LSub,
            "fsub" => I::FSub,
            "dsub" => I::DSub,
            "imul" => I::IMul,
            "lmul" => I::LMul,
            "fmul" => I::FMul,
            "dmul" => I::DMul,
            "idiv" => I::IDiv,
            "ldiv" => I::LDiv,
            "fdiv" => I::FDiv,
            "ddiv" => I::DDiv,
            "irem" => I::IRem,
            "lrem" => I::LRem,
            "frem" => I::FRem,
            "drem" => I::DRem,
            "ineg" => I::INeg,
            "lneg" => I::LNeg,
            "fneg" => I::FNeg,
            "dneg" => I::DNeg,
            "ishl" => I::ISh(ShiftType::Left),
            "ishr" => I::ISh(ShiftType::ArithmeticRight),
            "iushr" => I::ISh(ShiftType::LogicalRight),
            "lshl" => I::LSh(ShiftType::Left),
            "lshr" => I::LSh(ShiftType::ArithmeticRight),
            "lushr" => I::LSh(ShiftType::LogicalRight),
            "iand" => I::IAnd,
            "land" => I::LAnd,
            "ior" => I::IOr,
            "lor" => I::LOr,
            "ixor" => I::IXor,
            "lxor" => I::LXor,
            "iinc" => {
                let slot = operands.number("local variable slot")?;
                let delta = operands.number("increment")?;
                I::IInc(slot, delta)
            }
            "i2l" => I::I2L,
            "i2f" => I::I2F,
            "i2d" => I::I2D,
            "l2i" => I::L2I,
            "l2f" => I::L2F,
            "l2d" => I::L2D,
            "f2i" => I::F2I,
            "f2l" => I::F2L,
            "f2d" => I::F2D,
            "d2i" => I::D2I,
            "d2l" => I::D2L,
            "d2f" => I::D2F,
            "i2b" => I::I2B,
            "i2c" => I::I2C,
            "i2s" => I::I2S,
            "lcmp" => I::LCmp,
            "fcmpl" => I::FCmp(CompareMode::L),
            "fcmpg" => I::FCmp(CompareMode::G),
            "dcmpl" => I::DCmp(CompareMode::L),
            "dcmpg" => I::DCmp(CompareMode::G),
            "getstatic" => I::GetStatic(operands.field_ref()?),
            "putstatic" => I::PutStatic(operands.field_ref()?),
            "getfield" => I::GetField(operands.field_ref()?),
            "putfield" => I::PutField(operands.field_ref()?),
            "invokevirtual" => I::Invoke(InvokeType::Virtual, operands.method_ref(false)?),
            "invokespecial" => I::Invoke(InvokeType::Special, operands.method_ref(false)?),
            "invokestatic" => I::Invoke(InvokeType::Static, operands.method_ref(false)?),
            "invokeinterface" => I::Invoke(InvokeType::Interface, operands.method_ref(true)?),
            "invokedynamic" => {
                let word = operands.word("a call site name and descriptor")?;
                let paren = word
                    .find('(')
                    .ok_or_else(|| operands.error(format!("Call site '{}' has no descriptor", word)))?;
                let name = operands.unqualified_name(&word[..paren])?;
                let descriptor = operands.method_descriptor(&word[paren..])?;
                let bootstrap = operands.handle()?;
                let mut bootstrap_args = vec![];
                while !operands.is_empty() {
                    bootstrap_args.push(operands.constant()?);
                }
                I::InvokeDynamic(IndyCall {
                    name,
                    descriptor,
                    bootstrap,
                    bootstrap_args,
                })
            }
            "new" => {
                let name = operands.word("a class name")?;
                I::New(operands.binary_name(name)?)
            }
            "newarray" => {
                let element = match operands.word("a primitive type")? {
                    "boolean" => BaseType::Boolean,
                    "char" => BaseType::Char,
                    "float" => BaseType::Float,
                    "double" => BaseType::Double,
                    "byte" => BaseType::Byte,
                    "short" => BaseType::Short,
                    "int" => BaseType::Int,
                    "long" => BaseType::Long,
                    other => {
                        return Err(operands.error(format!("Unknown primitive type '{}'", other)))
                    }
                };
                I::NewArray(element)
            }
            "anewarray" => I::ANewArray(operands.ref_type()?),
            "multianewarray" => {
                let array_type = operands.ref_type()?;
                let dimensions = operands.number("dimension count")?;
                I::MultiANewArray(array_type, dimensions)
            }
            "arraylength" => I::ArrayLength,
            "checkcast" => I::CheckCast(operands.ref_type()?),
            "instanceof" => I::InstanceOf(operands.ref_type()?),
            "monitorenter" => I::MonitorEnter,
            "monitorexit" => I::MonitorExit,
            _ => return self.branch_instruction(opcode, operands).map(Insn::Branch),
        };
        Ok(Insn::Simple(simple))
    }

    fn branch_instruction(
        &mut self,
        opcode: &str,
        operands: &mut Operands,
    ) -> Result<BranchInstruction<SynLabel>> {
        use BranchInstruction as B;

        let branch = match opcode {
            "ifeq" => B::If(OrdComparison::EQ, self.label(operands)?),
            "ifne" => B::If(OrdComparison::NE, self.label(operands)?),
            "iflt" => B::If(OrdComparison::LT, self.label(operands)?),
            "ifge" => B::If(OrdComparison::GE, self.label(operands)?),
            "ifgt" => B::If(OrdComparison::GT, self.label(operands)?),
            "ifle" => B::If(OrdComparison::LE, self.label(operands)?),
            "if_icmpeq" => B::IfICmp(OrdComparison::EQ, self.label(operands)?),
            "if_icmpne" => B::IfICmp(OrdComparison::NE, self.label(operands)?),
            "if_icmplt" => B::IfICmp(OrdComparison::LT, self.label(operands)?),
            "if_icmpge" => B::IfICmp(OrdComparison::GE, self.label(operands)?),
            "if_icmpgt" => B::IfICmp(OrdComparison::GT, self.label(operands)?),
            "if_icmple" => B::IfICmp(OrdComparison::LE, self.label(operands)?),
            "if_acmpeq" => B::IfACmp(EqComparison::EQ, self.label(operands)?),
            "if_acmpne" => B::IfACmp(EqComparison::NE, self.label(operands)?),
            "ifnull" => B::IfNull(EqComparison::EQ, self.label(operands)?),
            "ifnonnull" => B::IfNull(EqComparison::NE, self.label(operands)?),
            "goto" | "goto_w" => B::Goto(self.label(operands)?),
            "tableswitch" => {
                let low = operands.number("lowest switch key")?;
                let default = self.label(operands)?;
                let mut targets = vec![];
                while !operands.is_empty() {
                    targets.push(self.label(operands)?);
                }
                B::TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            "lookupswitch" => {
                let default = self.label(operands)?;
                let mut targets: Vec<(i32, SynLabel)> = vec![];
                while !operands.is_empty() {
                    let case = operands.word("a 'key:label' switch case")?;
                    let (key, label) = case.split_once(':').ok_or_else(|| {
                        operands.error(format!("Switch case '{}' should be 'key:label'", case))
                    })?;
                    let key: i32 = key
                        .parse()
                        .map_err(|_| operands.error(format!("Invalid switch key '{}'", key)))?;
                    targets.push((key, self.labels.get(label)));
                }
                targets.sort_by_key(|(key, _)| *key);
                B::LookupSwitch { default, targets }
            }
            "ireturn" => B::IReturn,
            "lreturn" => B::LReturn,
            "freturn" => B::FReturn,
            "dreturn" => B::DReturn,
            "areturn" => B::AReturn,
            "return" => B::Return,
            "athrow" => B::AThrow,
            other => return Err(operands.error(format!("Unknown instruction '{}'", other))),
        };
        Ok(branch)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ErrorCategory;

    const CLAMP: &str = r#"
// Clamp from below
method public static com/acme/Util.clamp(II)I
  params value low
  local value I start done 0
start:
  line 12 start
  iload 0
  iload 1
  if_icmpge above
  iload 1
  ireturn
above:
  frame same
  iload 0
  ireturn
done:
end
"#;

    #[test]
    fn whole_method() {
        let body = parse_method(CLAMP).unwrap();
        assert_eq!(body.info.owner.as_str(), "com/acme/Util");
        assert_eq!(body.info.name.as_str(), "clamp");
        assert!(body.info.is_static());
        assert!(body.info.access_flags.contains(MethodAccessFlags::PUBLIC));
        assert_eq!(body.info.descriptor.parameters.len(), 2);
        assert_eq!(
            body.info.parameter_names[1].as_ref().map(Name::as_str),
            Some("low")
        );

        assert_eq!(body.nodes.len(), 12);
        assert!(matches!(body.nodes[0], Insn::Label(SynLabel(0))));
        assert!(matches!(
            body.nodes[1],
            Insn::LineNumber {
                line: 12,
                start: SynLabel(0)
            }
        ));
        assert!(matches!(
            body.nodes[4],
            Insn::Branch(BranchInstruction::IfICmp(OrdComparison::GE, SynLabel(2)))
        ));
        assert!(matches!(&body.nodes[8], Insn::Frame(frame) if frame.kind == FrameKind::Same));
        assert_eq!(body.label_position(SynLabel(2)), Some(7));

        assert_eq!(body.local_variables.len(), 1);
        assert_eq!(body.local_variables[0].end, SynLabel(1));
    }

    #[test]
    fn operands() {
        let body = parse_method(
            r#"
method com/acme/Box.fill(Ljava/lang/String;)V
  ldc "say \"hi\" // not a comment"
  ldc 3000000000L
  ldc 1.5f
  ldc 2.0
  ldc class [Ljava/lang/String;
  ldc dynamic ZERO:I invokestatic:com/acme/Boot.zero:(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;I)I { 7 }
  invokeinterface java/util/List.size()I
  invokestatic com/acme/Api.of()V itf
  getfield com/acme/Box.items:[Ljava/lang/Object;
  multianewarray [[I 2
  tableswitch 1 out a b
  lookupswitch out 9:b -2:a
a:
b:
out:
  frame full com/acme/Box top long | int uninit:a
  return
end
"#,
        )
        .unwrap();

        let ldc = |index: usize| match &body.nodes[index] {
            Insn::Simple(Instruction::Ldc(constant)) => constant.clone(),
            other => panic!("Expected ldc, found {:?}", other),
        };
        assert_eq!(
            ldc(0),
            LdcConstant::String(String::from("say \"hi\" // not a comment"))
        );
        assert_eq!(ldc(1), LdcConstant::Long(3_000_000_000));
        assert_eq!(ldc(2), LdcConstant::Float(1.5));
        assert_eq!(ldc(3), LdcConstant::Double(2.0));
        assert!(matches!(ldc(4), LdcConstant::Class(RefType::ObjectArray(_))));
        match ldc(5) {
            LdcConstant::Dynamic(dynamic) => {
                assert_eq!(dynamic.name.as_str(), "ZERO");
                assert_eq!(dynamic.bootstrap.kind, HandleKind::InvokeStatic);
                assert_eq!(dynamic.bootstrap_args, vec![LdcConstant::Integer(7)]);
            }
            other => panic!("Expected dynamic constant, found {:?}", other),
        }

        assert!(matches!(
            &body.nodes[6],
            Insn::Simple(Instruction::Invoke(InvokeType::Interface, method)) if method.is_interface
        ));
        assert!(matches!(
            &body.nodes[7],
            Insn::Simple(Instruction::Invoke(InvokeType::Static, method)) if method.is_interface
        ));
        assert!(matches!(
            &body.nodes[9],
            Insn::Simple(Instruction::MultiANewArray(_, 2))
        ));
        match &body.nodes[11] {
            Insn::Branch(BranchInstruction::LookupSwitch { targets, .. }) => {
                let keys: Vec<i32> = targets.iter().map(|(key, _)| *key).collect();
                assert_eq!(keys, vec![-2, 9]);
            }
            other => panic!("Expected lookupswitch, found {:?}", other),
        }
        match &body.nodes[15] {
            Insn::Frame(frame) => {
                assert_eq!(frame.kind, FrameKind::Full);
                assert_eq!(frame.locals.len(), 3);
                assert_eq!(frame.locals[2], VerificationType::Long);
                assert_eq!(
                    frame.stack,
                    vec![
                        VerificationType::Integer,
                        VerificationType::Uninitialized(SynLabel(1))
                    ]
                );
            }
            other => panic!("Expected frame, found {:?}", other),
        }
    }

    #[test]
    fn several_methods() {
        let methods = parse_methods(
            "method com/acme/A.f()V\n  return\nend\n\nmethod com/acme/A.g()V\n  return\nend\n",
        )
        .unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[1].info.name.as_str(), "g");
        assert!(parse_method("").is_err());
    }

    #[test]
    fn errors_carry_line_numbers() {
        let unknown = parse_method("method com/acme/A.f()V\n  frobnicate\nend\n");
        assert!(matches!(unknown, Err(Error::Parse { line: 2, .. })));

        let too_wide = parse_method("method com/acme/A.f()V\n  bipush 300\n  return\nend\n");
        assert!(matches!(too_wide, Err(Error::Parse { line: 2, .. })));

        let unterminated = parse_method("method com/acme/A.f()V\n  return\n");
        assert!(matches!(unterminated, Err(Error::Parse { line: 2, .. })));

        let leftover = parse_method("method com/acme/A.f()V\n  return 1\nend\n");
        assert!(matches!(leftover, Err(Error::Parse { line: 2, .. })));

        let bad_descriptor = parse_method("method com/acme/A.f(Q)V\nend\n").unwrap_err();
        assert!(matches!(bad_descriptor, Error::BadDescriptor { .. }));
        assert_eq!(bad_descriptor.category(), ErrorCategory::Malformed);

        let twice = parse_method("method com/acme/A.f()V\na:\na:\n  return\nend\n");
        assert!(matches!(twice, Err(Error::Parse { line: 3, .. })));
    }
}
