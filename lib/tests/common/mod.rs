#![allow(dead_code)]

use jvm2ir::builder::{self, Settings};
use jvm2ir::ir::{Inst, LabelRef, Value};
use jvm2ir::jvm::text;

/// `if (x > 0) y = 1; else y = 2; return y;`
pub const SIGN: &str = r#"
method static com/acme/T.sign(I)I
  iload 0
  ifle negative
  iconst_1
  istore 1
  goto join
negative:
  iconst_2
  istore 1
join:
  iload 1
  ireturn
end
"#;

/// Loop whose body hands the value of slot 0 to slot 1 while the old value of slot 1 is still
/// on the stack, so that the copy into the loop register can only happen at the back edge
pub const HAND_OFF: &str = r#"
method static com/acme/T.handOff(I)I
  iconst_0
  istore 1
head:
  iload 1
  ifeq done
  iload 1
  iload 0
  istore 1
  pop
  goto head
done:
  iload 1
  ireturn
end
"#;

/// `try { work(); } catch (IllegalStateException e) { throw e; }`
pub const RETHROW: &str = r#"
method static com/acme/T.rethrow()V
  try start stop handler java/lang/IllegalStateException
start:
  invokestatic com/acme/T.work()V
stop:
  return
handler:
  astore 0
  aload 0
  athrow
end
"#;

/// Switch on the old value of a loop register which the back edge overwrites
pub const SPIN: &str = r#"
method static com/acme/T.spin(I)V
  iconst_0
  istore 1
head:
  iload 1
  iload 0
  istore 1
  tableswitch 0 out head
out:
  return
end
"#;

/// Everything after the first return is dead, including a self loop
pub const EARLY: &str = r#"
method static com/acme/T.early(I)I
  iload 0
  ireturn
dead:
  iload 0
  ifeq dead
  iconst_1
  ireturn
end
"#;

/// The end of the protected range is unreachable
pub const GUARDED: &str = r#"
method static com/acme/T.guarded()I
  try start stop handler java/lang/ArithmeticException
start:
  line 3 start
  iconst_1
  iconst_0
  idiv
  ireturn
stop:
  iconst_0
  ireturn
handler:
  line 5 handler
  pop
  iconst_m1
  ireturn
end
"#;

/// Named locals, a nested loop, and a lookup switch
pub const NESTED: &str = r#"
method public static com/acme/T.table(I)I
  params size
  local size I begin finish 0
  local total I first finish 1
  local i I outer finish 2
begin:
  line 10 begin
  iconst_0
  istore 1
first:
  iconst_0
  istore 2
outer:
  line 11 outer
  iload 2
  iload 0
  if_icmpge finish
  iload 2
  lookupswitch skip 1:one 7:seven
one:
  iinc 1 1
  goto skip
seven:
  iload 1
  iconst_2
  imul
  istore 1
skip:
  iinc 2 1
  goto outer
finish:
  line 14 finish
  iload 1
  ireturn
end
"#;

/// The same call made twice into one local, with the first result saved in another local
pub const TWICE: &str = r#"
method static com/acme/T.twice()I
  invokestatic com/acme/T.next()I
  istore 0
  goto save
again:
  invokestatic com/acme/T.next()I
  istore 0
  iload 1
  iload 0
  iadd
  ireturn
save:
  iload 0
  istore 1
  goto again
end
"#;

/// `flag ? bytes[0] : chars[0]`, joined on the stack
pub const PICK: &str = r#"
method static com/acme/T.pick(Z[B[C)I
  iload 0
  ifeq chars
  aload 1
  iconst_0
  baload
  goto join
chars:
  frame same
  aload 2
  iconst_0
  caload
join:
  frame same1 int
  ireturn
end
"#;

/// A `short` and a `char` stored to the same local on different paths
pub const NARROW: &str = r#"
method static com/acme/T.narrow(Z[S[C)I
  iload 0
  ifeq chars
  aload 1
  iconst_0
  saload
  istore 3
  goto join
chars:
  aload 2
  iconst_0
  caload
  istore 3
join:
  iload 3
  ireturn
end
"#;

/// A local whose scope ends at a join, where both paths hold different values in it
pub const SCOPED: &str = r#"
method static com/acme/T.scoped(I)I
  invokestatic com/acme/T.make()Ljava/lang/Object;
  astore 1
  iload 0
  ifge keep
  invokestatic com/acme/T.name()Ljava/lang/String;
  astore 1
keep:
  frame append java/lang/Object
  aload 1
  invokestatic com/acme/T.use(Ljava/lang/Object;)V
  iload 0
  ifeq out
  invokestatic com/acme/T.name()Ljava/lang/String;
  astore 1
  aload 1
  invokestatic com/acme/T.use(Ljava/lang/Object;)V
out:
  frame chop 1
  iload 0
  ireturn
end
"#;

pub const FIXTURES: [&str; 11] = [
    SIGN, HAND_OFF, RETHROW, SPIN, EARLY, GUARDED, NESTED, TWICE, PICK, NARROW, SCOPED,
];

pub fn raw_settings() -> Settings {
    Settings {
        simplify: false,
        ..Settings::new()
    }
}

pub fn lift_with(listing: &str, settings: Settings) -> Vec<Inst> {
    let body = text::parse_method(listing).unwrap();
    builder::build(&body, settings).unwrap()
}

/// Build and simplify
pub fn lift(listing: &str) -> Vec<Inst> {
    lift_with(listing, Settings::new())
}

/// Build without simplifying
pub fn lift_raw(listing: &str) -> Vec<Inst> {
    lift_with(listing, raw_settings())
}

/// Position of the label instruction binding `label`
pub fn label_position(insts: &[Inst], label: LabelRef) -> usize {
    insts
        .iter()
        .position(|inst| *inst == Inst::Label(label))
        .unwrap_or_else(|| panic!("No label {} in {:#?}", label, insts))
}

/// Every label an instruction refers to, be it a jump target, a range bound, or a line start
pub fn referenced_labels(inst: &Inst) -> Vec<LabelRef> {
    match inst {
        Inst::LineNumber { start, .. } => vec![*start],
        Inst::Catch(catch) => std::iter::once(catch.handler)
            .chain(
                catch
                    .entries
                    .iter()
                    .flat_map(|entry| [entry.start_inclusive, entry.end_exclusive]),
            )
            .collect(),
        _ => inst.successors(),
    }
}

pub fn returned_value(insts: &[Inst]) -> Value {
    insts
        .iter()
        .find_map(|inst| match inst {
            Inst::Return(Some(value)) => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("No value returned in {:#?}", insts))
}

/// Right hand sides of all the assignments to `target`
pub fn assigned_to<'i>(insts: &'i [Inst], target: &Value) -> Vec<&'i jvm2ir::ir::Expr> {
    insts
        .iter()
        .filter_map(Inst::as_assign)
        .filter(|assign| assign.lhv == *target)
        .map(|assign| &assign.rhv)
        .collect()
}
