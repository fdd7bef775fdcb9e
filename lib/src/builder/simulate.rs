//! Symbolic execution of straight-line nodes and stack map frames

use super::{Frame, FrameBuilder, FrameTypes, RawInstListBuilder, StackShuffle};
use crate::ir::{
    ArrayAccess, BinaryExpr, BinaryOp, BsmArg, BsmHandle, BsmHandleTag, CallExpr, CallKind,
    Constant, DynamicCall, Expr, FieldRef, IfInst, Inst, LocalVarKind, MethodCall, MethodConstant,
    SwitchInst, TypeName, Value,
};
use crate::jvm::{
    BranchInstruction, CompareMode, EqComparison, FrameKind, Handle,
    HandleDescriptor, HandleKind, IndyCall, Insn, Instruction, InvokeType, LdcConstant,
    MethodRef, Name, OrdComparison, ShiftType, SynLabel, VerificationType,
};
use crate::{Error, Result};

impl<'a> RawInstListBuilder<'a> {
    /// Simulate a node with a single predecessor
    pub(super) fn build_simple_node(&mut self, node: usize, insn: &Insn) -> Result<Frame> {
        let mut frame = FrameBuilder::new(node, self.predecessor_frame(node)?);
        match insn {
            Insn::LineNumber { line, start } => {
                let start = self.label_ref(*start)?;
                self.add_inst(node, Inst::LineNumber { line: *line, start });
            }
            Insn::Simple(instruction) => self.build_instruction(node, instruction, &mut frame)?,
            Insn::Branch(branch) => self.build_branch(node, branch, &mut frame)?,
            Insn::Label(_) | Insn::Frame(_) => {
                return Err(Error::InvalidInstruction(format!("{:?}", insn)))
            }
        }
        Ok(frame.finish())
    }

    /// Assign an expression to a fresh register and push it
    fn push_assigned(&mut self, node: usize, frame: &mut FrameBuilder, expr: Expr) {
        let register = self.fresh_register(expr.type_name());
        let inst = self.create_raw_assign(Value::from(register.clone()), expr);
        self.add_inst(node, inst);
        frame.push(register);
    }

    fn build_instruction(
        &mut self,
        node: usize,
        instruction: &Instruction,
        frame: &mut FrameBuilder,
    ) -> Result<()> {
        use Instruction::*;

        match instruction {
            Nop => (),

            AConstNull => frame.push(Constant::Null),
            IConstM1 => frame.push(Constant::Int(-1)),
            IConst0 => frame.push(Constant::Int(0)),
            IConst1 => frame.push(Constant::Int(1)),
            IConst2 => frame.push(Constant::Int(2)),
            IConst3 => frame.push(Constant::Int(3)),
            IConst4 => frame.push(Constant::Int(4)),
            IConst5 => frame.push(Constant::Int(5)),
            LConst0 => frame.push(Constant::Long(0)),
            LConst1 => frame.push(Constant::Long(1)),
            FConst0 => frame.push(Constant::Float(0.0)),
            FConst1 => frame.push(Constant::Float(1.0)),
            FConst2 => frame.push(Constant::Float(2.0)),
            DConst0 => frame.push(Constant::Double(0.0)),
            DConst1 => frame.push(Constant::Double(1.0)),
            BiPush(value) => frame.push(Constant::Int(*value as i32)),
            SiPush(value) => frame.push(Constant::Int(*value as i32)),
            Ldc(constant) => self.build_ldc(node, constant, frame)?,

            ILoad(slot) | LLoad(slot) | FLoad(slot) | DLoad(slot) | ALoad(slot) => {
                let value = frame.local(*slot as usize)?;
                frame.push(value);
            }
            IStore(slot) | LStore(slot) | FStore(slot) | DStore(slot) | AStore(slot) => {
                let value = frame.pop()?;
                if let Some(inst) = self.store_local(node, frame, *slot as usize, value) {
                    self.add_inst(node, inst);
                }
            }

            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
                let index = frame.pop()?;
                let array = frame.pop()?;
                let type_name = array.type_name().element_type();
                let access = Value::ArrayAccess(Box::new(ArrayAccess {
                    array,
                    index,
                    type_name,
                }));
                self.push_assigned(node, frame, Expr::Value(access));
            }
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                let value = frame.pop()?;
                let index = frame.pop()?;
                let array = frame.pop()?;
                let type_name = array.type_name().element_type();
                let access = Value::ArrayAccess(Box::new(ArrayAccess {
                    array,
                    index,
                    type_name,
                }));
                let inst = self.create_raw_assign(access, value);
                self.add_inst(node, inst);
            }

            Pop => frame.shuffle(StackShuffle::Pop)?,
            Pop2 => frame.shuffle(StackShuffle::Pop2)?,
            Dup => frame.shuffle(StackShuffle::Dup)?,
            DupX1 => frame.shuffle(StackShuffle::DupX1)?,
            DupX2 => frame.shuffle(StackShuffle::DupX2)?,
            Dup2 => frame.shuffle(StackShuffle::Dup2)?,
            Dup2X1 => frame.shuffle(StackShuffle::Dup2X1)?,
            Dup2X2 => frame.shuffle(StackShuffle::Dup2X2)?,
            Swap => frame.shuffle(StackShuffle::Swap)?,

            IAdd | LAdd | FAdd | DAdd => self.build_binary(node, BinaryOp::Add, frame)?,
            ISub | LSub | FSub | DSub => self.build_binary(node, BinaryOp::Sub, frame)?,
            IMul | LMul | FMul | DMul => self.build_binary(node, BinaryOp::Mul, frame)?,
            IDiv | LDiv | FDiv | DDiv => self.build_binary(node, BinaryOp::Div, frame)?,
            IRem | LRem | FRem | DRem => self.build_binary(node, BinaryOp::Rem, frame)?,
            ISh(shift) | LSh(shift) => {
                let op = match shift {
                    ShiftType::Left => BinaryOp::Shl,
                    ShiftType::ArithmeticRight => BinaryOp::Shr,
                    ShiftType::LogicalRight => BinaryOp::Ushr,
                };
                self.build_binary(node, op, frame)?
            }
            IAnd | LAnd => self.build_binary(node, BinaryOp::And, frame)?,
            IOr | LOr => self.build_binary(node, BinaryOp::Or, frame)?,
            IXor | LXor => self.build_binary(node, BinaryOp::Xor, frame)?,

            INeg | LNeg | FNeg | DNeg => {
                let operand = frame.pop()?;
                let type_name = operand.type_name().wider(&TypeName::INT);
                self.push_assigned(node, frame, Expr::Neg { type_name, operand });
            }
            ArrayLength => {
                let array = frame.pop()?;
                self.push_assigned(node, frame, Expr::Length { array });
            }

            IInc(slot, increment) => {
                let slot = *slot as usize;
                let local = frame.local(slot)?;
                let increment = Value::from(Constant::Int(*increment as i32));
                let type_name = local.type_name().binary_result(&increment.type_name());
                let register = self.fresh_register(type_name.clone());
                let expr = Expr::Binary(BinaryExpr {
                    op: BinaryOp::Add,
                    type_name,
                    lhv: local,
                    rhv: increment,
                });
                let inst = self.create_raw_assign(Value::from(register.clone()), expr);
                self.add_inst(node, inst);
                if let Some(inst) = self.store_local(node, frame, slot, Value::from(register)) {
                    self.add_inst(node, inst);
                }
            }

            I2L | F2L | D2L => self.build_cast(node, TypeName::LONG, frame)?,
            I2F | L2F | D2F => self.build_cast(node, TypeName::FLOAT, frame)?,
            I2D | L2D | F2D => self.build_cast(node, TypeName::DOUBLE, frame)?,
            L2I | F2I | D2I => self.build_cast(node, TypeName::INT, frame)?,
            I2B => self.build_cast(node, TypeName::BYTE, frame)?,
            I2C => self.build_cast(node, TypeName::CHAR, frame)?,
            I2S => self.build_cast(node, TypeName::SHORT, frame)?,

            LCmp => self.build_compare(node, BinaryOp::Cmp, frame)?,
            FCmp(CompareMode::L) | DCmp(CompareMode::L) => {
                self.build_compare(node, BinaryOp::Cmpl, frame)?
            }
            FCmp(CompareMode::G) | DCmp(CompareMode::G) => {
                self.build_compare(node, BinaryOp::Cmpg, frame)?
            }

            GetStatic(field) => {
                let field = FieldRef {
                    instance: None,
                    owner: TypeName::from_binary_name(&field.owner),
                    name: field.name.as_str().to_owned(),
                    type_name: TypeName::from(&field.descriptor),
                };
                self.push_assigned(node, frame, Expr::Value(Value::Field(Box::new(field))));
            }
            GetField(field) => {
                let instance = frame.pop()?;
                let field = FieldRef {
                    instance: Some(instance),
                    owner: TypeName::from_binary_name(&field.owner),
                    name: field.name.as_str().to_owned(),
                    type_name: TypeName::from(&field.descriptor),
                };
                self.push_assigned(node, frame, Expr::Value(Value::Field(Box::new(field))));
            }
            PutStatic(field) => {
                let value = frame.pop()?;
                let field = FieldRef {
                    instance: None,
                    owner: TypeName::from_binary_name(&field.owner),
                    name: field.name.as_str().to_owned(),
                    type_name: TypeName::from(&field.descriptor),
                };
                let inst = self.create_raw_assign(Value::Field(Box::new(field)), value);
                self.add_inst(node, inst);
            }
            PutField(field) => {
                let value = frame.pop()?;
                let instance = frame.pop()?;
                let field = FieldRef {
                    instance: Some(instance),
                    owner: TypeName::from_binary_name(&field.owner),
                    name: field.name.as_str().to_owned(),
                    type_name: TypeName::from(&field.descriptor),
                };
                let inst = self.create_raw_assign(Value::Field(Box::new(field)), value);
                self.add_inst(node, inst);
            }

            Invoke(invoke_type, method) => self.build_invoke(node, *invoke_type, method, frame)?,
            InvokeDynamic(call) => self.build_invoke_dynamic(node, call, frame)?,

            New(class) => {
                let type_name = TypeName::from_binary_name(class);
                self.push_assigned(node, frame, Expr::New(type_name));
            }
            NewArray(base_type) => {
                let length = frame.pop()?;
                let type_name = TypeName::from(*base_type).as_array(1);
                self.push_assigned(
                    node,
                    frame,
                    Expr::NewArray {
                        type_name,
                        dimensions: vec![length],
                    },
                );
            }
            ANewArray(element) => {
                let length = frame.pop()?;
                let type_name = TypeName::from(element).as_array(1);
                self.push_assigned(
                    node,
                    frame,
                    Expr::NewArray {
                        type_name,
                        dimensions: vec![length],
                    },
                );
            }
            MultiANewArray(array_type, dimensions) => {
                let dimensions = frame.pop_many(*dimensions as usize)?;
                let type_name = TypeName::from(array_type);
                self.push_assigned(
                    node,
                    frame,
                    Expr::NewArray {
                        type_name,
                        dimensions,
                    },
                );
            }
            CheckCast(target) => {
                let operand = frame.pop()?;
                let type_name = TypeName::from(target);
                self.push_assigned(node, frame, Expr::Cast { type_name, operand });
            }
            InstanceOf(target) => {
                let operand = frame.pop()?;
                let target = TypeName::from(target);
                self.push_assigned(node, frame, Expr::InstanceOf { operand, target });
            }

            MonitorEnter => {
                let monitor = frame.pop()?;
                self.add_inst(node, Inst::EnterMonitor(monitor));
            }
            MonitorExit => {
                let monitor = frame.pop()?;
                self.add_inst(node, Inst::ExitMonitor(monitor));
            }
        }
        Ok(())
    }

    fn build_binary(&mut self, node: usize, op: BinaryOp, frame: &mut FrameBuilder) -> Result<()> {
        let rhv = frame.pop()?;
        let lhv = frame.pop()?;
        let type_name = lhv.type_name().binary_result(&rhv.type_name());
        let expr = Expr::Binary(BinaryExpr {
            op,
            type_name,
            lhv,
            rhv,
        });
        self.push_assigned(node, frame, expr);
        Ok(())
    }

    fn build_compare(&mut self, node: usize, op: BinaryOp, frame: &mut FrameBuilder) -> Result<()> {
        let rhv = frame.pop()?;
        let lhv = frame.pop()?;
        let expr = Expr::Binary(BinaryExpr {
            op,
            type_name: TypeName::INT,
            lhv,
            rhv,
        });
        self.push_assigned(node, frame, expr);
        Ok(())
    }

    fn build_cast(&mut self, node: usize, type_name: TypeName, frame: &mut FrameBuilder) -> Result<()> {
        let operand = frame.pop()?;
        self.push_assigned(node, frame, Expr::Cast { type_name, operand });
        Ok(())
    }

    /// Either an assignment of the call result to a fresh register, or a call instruction
    fn emit_call(&mut self, node: usize, call: CallExpr, frame: &mut FrameBuilder) {
        if *call.return_type() == TypeName::VOID {
            self.add_inst(node, Inst::Call(call));
        } else {
            self.push_assigned(node, frame, Expr::Call(call));
        }
    }

    fn build_invoke(
        &mut self,
        node: usize,
        invoke_type: InvokeType,
        method: &MethodRef,
        frame: &mut FrameBuilder,
    ) -> Result<()> {
        let owner = TypeName::from(&method.owner);
        let owner = if owner.is_array() { TypeName::OBJECT } else { owner };
        let argument_types = TypeName::parameter_types(&method.descriptor);
        let return_type = TypeName::return_type(&method.descriptor);
        let args = frame.pop_many(argument_types.len())?;

        let (kind, instance) = match invoke_type {
            InvokeType::Static => (CallKind::Static, None),
            InvokeType::Virtual => (CallKind::Virtual, Some(frame.pop()?)),
            InvokeType::Special => (CallKind::Special, Some(frame.pop()?)),
            InvokeType::Interface => (CallKind::Interface, Some(frame.pop()?)),
        };
        let call = CallExpr::Method(MethodCall {
            kind,
            owner,
            name: method.name.as_str().to_owned(),
            argument_types,
            return_type,
            instance,
            args,
            is_interface: method.is_interface,
        });
        self.emit_call(node, call, frame);
        Ok(())
    }

    fn build_invoke_dynamic(
        &mut self,
        node: usize,
        call: &IndyCall,
        frame: &mut FrameBuilder,
    ) -> Result<()> {
        let mut bsm_args = call
            .bootstrap_args
            .iter()
            .map(bsm_arg)
            .collect::<Result<Vec<_>>>()?;
        bsm_args.reverse();

        let argument_types = TypeName::parameter_types(&call.descriptor);
        let args = frame.pop_many(argument_types.len())?;
        let call = CallExpr::Dynamic(DynamicCall {
            bsm: bsm_handle(&call.bootstrap),
            bsm_args,
            name: call.name.as_str().to_owned(),
            argument_types,
            return_type: TypeName::return_type(&call.descriptor),
            args,
        });
        self.emit_call(node, call, frame);
        Ok(())
    }

    fn build_ldc(&mut self, node: usize, constant: &LdcConstant, frame: &mut FrameBuilder) -> Result<()> {
        match constant {
            LdcConstant::Integer(_)
            | LdcConstant::Float(_)
            | LdcConstant::Long(_)
            | LdcConstant::Double(_)
            | LdcConstant::String(_) => frame.push(ldc_value(constant)?),

            LdcConstant::Class(_) | LdcConstant::MethodType(_) | LdcConstant::MethodHandle(_) => {
                let value = ldc_value(constant)?;
                self.push_assigned(node, frame, Expr::Value(value));
            }

            LdcConstant::Dynamic(dynamic) => {
                let lookup = self.fresh_register(TypeName::METHOD_HANDLES_LOOKUP);
                let lookup_call = CallExpr::Method(MethodCall {
                    kind: CallKind::Static,
                    owner: TypeName::METHOD_HANDLES,
                    name: String::from("lookup"),
                    argument_types: vec![],
                    return_type: TypeName::METHOD_HANDLES_LOOKUP,
                    instance: None,
                    args: vec![],
                    is_interface: false,
                });
                let inst = self.create_raw_assign(Value::from(lookup.clone()), Expr::Call(lookup_call));
                self.add_inst(node, inst);

                let bootstrap = bsm_handle(&dynamic.bootstrap);
                let mut args = vec![
                    Value::from(lookup),
                    Value::from(Constant::String(dynamic.name.as_str().to_owned())),
                    Value::from(Constant::Class(TypeName::from(&dynamic.descriptor))),
                ];
                for argument in &dynamic.bootstrap_args {
                    args.push(ldc_value(argument)?);
                }
                let call = CallExpr::Method(MethodCall {
                    kind: CallKind::Static,
                    owner: bootstrap.owner,
                    name: bootstrap.name,
                    argument_types: bootstrap.argument_types,
                    return_type: TypeName::from(&dynamic.descriptor),
                    instance: None,
                    args,
                    is_interface: bootstrap.is_interface,
                });
                self.push_assigned(node, frame, Expr::Call(call));
            }
        }
        Ok(())
    }

    /// Store a value into a local slot
    ///
    /// The register already held by the slot is reused when it holds a value of the same type
    /// that nothing else refers to; otherwise the slot gets a new register, named after the
    /// debug table entry starting at the store if there is one. Arguments are never
    /// overwritten: the slot just starts holding the stored value.
    pub(super) fn store_local(
        &mut self,
        node: usize,
        frame: &mut FrameBuilder,
        slot: usize,
        expr: Value,
    ) -> Option<Inst> {
        let info = self
            .debug_local_covering(slot, node)
            .map(|local| (local.name.clone(), local.type_name.clone(), local.start));
        let is_argument = slot < self.arg_counter
            && matches!(&info, Some((_, _, start)) if Some(*start) == self.first_label);

        let expr_type = expr.type_name();
        let old = frame.frame.find_local(slot).cloned().filter(|old| {
            let old_type = old.type_name();
            !(expr_type.is_primitive() != old_type.is_primitive()
                && old_type != TypeName::NULL
                && !is_argument)
        });

        match old {
            Some(Value::Argument(_)) => {
                frame.frame.put_local(slot, expr);
                None
            }
            Some(old)
                if old.type_name() == expr_type
                    || (expr == Value::Constant(Constant::Null)
                        && !old.type_name().is_primitive()) =>
            {
                if frame.frame.used_in_stack(&old) || frame.frame.used_in_locals(&old, slot) {
                    frame.frame.put_local(slot, expr);
                    return None;
                }
                let same_variable = match &old {
                    Value::Local(local) => {
                        info.as_ref().map(|(name, _, _)| name)
                            == self.register_to_local_name.get(&local.index)
                    }
                    _ => false,
                };
                if same_variable {
                    Some(self.create_raw_assign(old, expr))
                } else {
                    Some(self.assign_next_declared(node, frame, slot, expr_type, expr))
                }
            }
            Some(_) => Some(self.assign_next_declared(node, frame, slot, expr_type, expr)),
            None => {
                let type_name = if expr_type == TypeName::NULL {
                    info.map(|(_, type_name, _)| type_name)
                        .or_else(|| frame.frame.find_local(slot).map(Value::type_name))
                        .unwrap_or(TypeName::OBJECT)
                } else {
                    expr_type
                };
                Some(self.assign_next_declared(node, frame, slot, type_name, expr))
            }
        }
    }

    fn assign_next_declared(
        &mut self,
        node: usize,
        frame: &mut FrameBuilder,
        slot: usize,
        type_name: TypeName,
        expr: Value,
    ) -> Inst {
        let register = self.next_register_declared_variable(type_name, slot, node);
        frame.frame.put_local(slot, register.clone());
        self.create_raw_assign(register, expr)
    }

    /// Fresh register for a store, named and typed after the debug table entry of the slot
    /// starting at the next label
    fn next_register_declared_variable(&mut self, type_name: TypeName, slot: usize, node: usize) -> Value {
        let next_label = (node..=self.body.nodes.len())
            .find(|id| matches!(self.body.nodes.get(id.wrapping_sub(1)), Some(Insn::Label(_))));
        let mut candidates = self
            .debug_locals
            .iter()
            .filter(|local| local.slot == slot && Some(local.start) == next_label);
        let declared = match (candidates.next(), candidates.next()) {
            (Some(local), None) => Some((local.name.clone(), local.type_name.clone())),
            _ => None,
        };

        let mut register = self.fresh_register(type_name.clone());
        if let Some((name, declared_type)) = declared {
            if self.settings.keep_local_variable_names {
                register.name = name.clone();
                register.kind = LocalVarKind::NamedLocal;
                self.register_to_local_name.insert(register.index, name);
            }
            if !declared_type.is_primitive() && !type_name.is_array() {
                register.type_name = declared_type;
            }
        }
        Value::from(register)
    }

    fn build_branch(
        &mut self,
        node: usize,
        branch: &BranchInstruction<SynLabel>,
        frame: &mut FrameBuilder,
    ) -> Result<()> {
        use BranchInstruction::*;

        match branch {
            Return => self.add_inst(node, Inst::Return(None)),
            IReturn | LReturn | FReturn | DReturn | AReturn => {
                let value = frame.pop()?;
                self.add_inst(node, Inst::Return(Some(value)));
            }
            AThrow => {
                let throwable = frame.pop()?;
                self.add_inst(node, Inst::Throw(throwable));
            }
            Goto(target) => {
                let target = self.label_ref(*target)?;
                self.add_inst(node, Inst::Goto(target));
            }
            If(comparison, target) => {
                let value = frame.pop()?;
                let zero = Value::from(Constant::zero(&value.type_name()));
                self.build_conditional(node, ord_op(*comparison), value, zero, *target)?;
            }
            IfICmp(comparison, target) => {
                let rhv = frame.pop()?;
                let lhv = frame.pop()?;
                self.build_conditional(node, ord_op(*comparison), lhv, rhv, *target)?;
            }
            IfACmp(comparison, target) => {
                let rhv = frame.pop()?;
                let lhv = frame.pop()?;
                self.build_conditional(node, eq_op(*comparison), lhv, rhv, *target)?;
            }
            IfNull(comparison, target) => {
                let value = frame.pop()?;
                let null = Value::from(Constant::Null);
                self.build_conditional(node, eq_op(*comparison), value, null, *target)?;
            }
            TableSwitch {
                default,
                low,
                targets,
            } => {
                let key = frame.pop()?;
                let branches = targets
                    .iter()
                    .enumerate()
                    .map(|(offset, target)| {
                        let case = Value::from(Constant::Int(low.wrapping_add(offset as i32)));
                        Ok((case, self.label_ref(*target)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let default = self.label_ref(*default)?;
                self.add_inst(
                    node,
                    Inst::Switch(SwitchInst {
                        key,
                        branches,
                        default,
                    }),
                );
            }
            LookupSwitch { default, targets } => {
                let key = frame.pop()?;
                let branches = targets
                    .iter()
                    .map(|(case, target)| Ok((Value::from(Constant::Int(*case)), self.label_ref(*target)?)))
                    .collect::<Result<Vec<_>>>()?;
                let default = self.label_ref(*default)?;
                self.add_inst(
                    node,
                    Inst::Switch(SwitchInst {
                        key,
                        branches,
                        default,
                    }),
                );
            }
        }
        Ok(())
    }

    /// Conditional jump, falling through to the label of the next node (synthesized if the next
    /// node is not a label)
    fn build_conditional(
        &mut self,
        node: usize,
        op: BinaryOp,
        lhv: Value,
        rhv: Value,
        target: SynLabel,
    ) -> Result<()> {
        let true_branch = self.label_ref(target)?;
        let next_label = match self.body.nodes.get(node) {
            Some(Insn::Label(label)) => self.labels.get(label).copied(),
            _ => None,
        };
        let false_branch = match next_label {
            Some(label) => label,
            None => self.fresh_label(),
        };

        let condition = BinaryExpr {
            op,
            type_name: TypeName::BOOLEAN,
            lhv,
            rhv,
        };
        self.add_inst(
            node,
            Inst::If(IfInst {
                condition,
                true_branch,
                false_branch,
            }),
        );
        if next_label.is_none() {
            self.add_inst(node, Inst::Label(false_branch));
        }
        Ok(())
    }

    /// Stack map frame: re-type the predecessor frame for full frames, keep it otherwise
    pub(super) fn build_frame_node(&mut self, node: usize) -> Result<Frame> {
        let predecessor_frame = self.predecessor_frame(node)?;
        let types = self
            .declared_frames
            .get(&node)
            .ok_or(Error::FrameOutOfOrder(node))?;
        Ok(types.refine(&predecessor_frame, &mut self.local_type_refinement))
    }

    /// Expand every stack map frame into the full list of types it declares
    ///
    /// Incremental frames are relative to the previous frame in stream order, the first one to
    /// the frame implied by the method descriptor. `APPEND` adds locals, `CHOP` removes the last
    /// ones, and `SAME`/`SAME1` keep them. Only `SAME1`, `FULL` and `NEW` have a stack.
    pub(super) fn declare_frames(&mut self) -> Result<()> {
        let body = self.body;
        let info = &body.info;
        let mut locals: Vec<TypeName> = vec![];
        if !info.is_static() {
            locals.push(if info.name.as_str() == "<init>" {
                TypeName::UNINIT_THIS
            } else {
                TypeName::from_binary_name(&info.owner)
            });
        }
        locals.extend(
            TypeName::parameter_types(&info.descriptor)
                .into_iter()
                .map(|type_name| if type_name.is_int_like() { TypeName::INT } else { type_name }),
        );

        for (index, insn) in body.nodes.iter().enumerate() {
            let frame_node = match insn {
                Insn::Frame(frame_node) => frame_node,
                _ => continue,
            };
            let listed_locals = frame_node
                .locals
                .iter()
                .map(|verification_type| self.verification_type(verification_type))
                .collect::<Result<Vec<_>>>()?;
            let stack = frame_node
                .stack
                .iter()
                .map(|verification_type| self.verification_type(verification_type))
                .collect::<Result<Vec<_>>>()?;
            match frame_node.kind {
                FrameKind::New | FrameKind::Full => locals = listed_locals,
                FrameKind::Append => locals.extend(listed_locals),
                FrameKind::Chop => {
                    let kept = locals.len().saturating_sub(frame_node.chopped);
                    locals.truncate(kept);
                }
                FrameKind::Same | FrameKind::Same1 => (),
            }
            let types = FrameTypes::from_listed(locals.clone(), stack);
            self.declared_frames.insert(index + 1, types);
        }
        Ok(())
    }

    fn verification_type(&self, verification_type: &VerificationType) -> Result<TypeName> {
        Ok(match verification_type {
            VerificationType::Top => TypeName::TOP,
            VerificationType::Integer => TypeName::INT,
            VerificationType::Float => TypeName::FLOAT,
            VerificationType::Double => TypeName::DOUBLE,
            VerificationType::Long => TypeName::LONG,
            VerificationType::Null => TypeName::NULL,
            VerificationType::UninitializedThis => TypeName::UNINIT_THIS,
            VerificationType::Object(ref_type) => TypeName::from(ref_type),
            VerificationType::Uninitialized(label) => {
                // type of the first `new` after the label
                let start = self
                    .label_nodes
                    .get(label)
                    .copied()
                    .ok_or_else(|| Error::UnresolvedLabel(format!("{:?}", label)))?;
                self.body.nodes[start..]
                    .iter()
                    .find_map(|insn| match insn {
                        Insn::Simple(Instruction::New(class)) => {
                            Some(TypeName::from_binary_name(class))
                        }
                        _ => None,
                    })
                    .ok_or_else(|| Error::InvalidInstruction(format!("uninitialized {:?}", label)))?
            }
        })
    }
}

fn ord_op(comparison: OrdComparison) -> BinaryOp {
    match comparison {
        OrdComparison::EQ => BinaryOp::Eq,
        OrdComparison::NE => BinaryOp::Neq,
        OrdComparison::LT => BinaryOp::Lt,
        OrdComparison::LE => BinaryOp::Le,
        OrdComparison::GT => BinaryOp::Gt,
        OrdComparison::GE => BinaryOp::Ge,
    }
}

fn eq_op(comparison: EqComparison) -> BinaryOp {
    match comparison {
        EqComparison::EQ => BinaryOp::Eq,
        EqComparison::NE => BinaryOp::Neq,
    }
}

fn bsm_handle(handle: &Handle) -> BsmHandle {
    let tag = match handle.kind {
        HandleKind::GetField => BsmHandleTag::GetField,
        HandleKind::GetStatic => BsmHandleTag::GetStatic,
        HandleKind::PutField => BsmHandleTag::PutField,
        HandleKind::PutStatic => BsmHandleTag::PutStatic,
        HandleKind::InvokeVirtual => BsmHandleTag::InvokeVirtual,
        HandleKind::InvokeStatic => BsmHandleTag::InvokeStatic,
        HandleKind::InvokeSpecial => BsmHandleTag::InvokeSpecial,
        HandleKind::NewInvokeSpecial => BsmHandleTag::NewInvokeSpecial,
        HandleKind::InvokeInterface => BsmHandleTag::InvokeInterface,
    };
    let (argument_types, return_type) = match &handle.descriptor {
        HandleDescriptor::Field(field_type) => (vec![], TypeName::from(field_type)),
        HandleDescriptor::Method(descriptor) => (
            TypeName::parameter_types(descriptor),
            TypeName::return_type(descriptor),
        ),
    };
    BsmHandle {
        tag,
        owner: TypeName::from_binary_name(&handle.owner),
        name: handle.name.as_str().to_owned(),
        argument_types,
        return_type,
        is_interface: handle.is_interface,
    }
}

fn bsm_arg(constant: &LdcConstant) -> Result<BsmArg> {
    Ok(match constant {
        LdcConstant::Integer(value) => BsmArg::Constant(Constant::Int(*value)),
        LdcConstant::Float(value) => BsmArg::Constant(Constant::Float(*value)),
        LdcConstant::Long(value) => BsmArg::Constant(Constant::Long(*value)),
        LdcConstant::Double(value) => BsmArg::Constant(Constant::Double(*value)),
        LdcConstant::String(value) => BsmArg::Constant(Constant::String(value.clone())),
        LdcConstant::Class(ref_type) => BsmArg::Type(TypeName::from(ref_type)),
        LdcConstant::MethodType(descriptor) => BsmArg::MethodType {
            argument_types: TypeName::parameter_types(descriptor),
            return_type: TypeName::return_type(descriptor),
        },
        LdcConstant::MethodHandle(handle) => BsmArg::Handle(bsm_handle(handle)),
        LdcConstant::Dynamic(dynamic) => {
            return Err(Error::InvalidInstruction(format!(
                "dynamic constant {} as bootstrap argument",
                dynamic.name.as_str()
            )))
        }
    })
}

fn ldc_value(constant: &LdcConstant) -> Result<Value> {
    let constant = match constant {
        LdcConstant::Integer(value) => Constant::Int(*value),
        LdcConstant::Float(value) => Constant::Float(*value),
        LdcConstant::Long(value) => Constant::Long(*value),
        LdcConstant::Double(value) => Constant::Double(*value),
        LdcConstant::String(value) => Constant::String(value.clone()),
        LdcConstant::Class(ref_type) => Constant::Class(TypeName::from(ref_type)),
        LdcConstant::MethodType(descriptor) => Constant::MethodType {
            argument_types: TypeName::parameter_types(descriptor),
            return_type: TypeName::return_type(descriptor),
        },
        LdcConstant::MethodHandle(handle) => {
            let handle = bsm_handle(handle);
            Constant::Method(MethodConstant {
                owner: handle.owner,
                name: handle.name,
                argument_types: handle.argument_types,
                return_type: handle.return_type,
            })
        }
        LdcConstant::Dynamic(dynamic) => {
            return Err(Error::InvalidInstruction(format!(
                "nested dynamic constant {}",
                dynamic.name.as_str()
            )))
        }
    };
    Ok(Value::from(constant))
}
