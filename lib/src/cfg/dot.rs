//! Graphviz rendering of instruction and block graphs

use super::{BlockGraph, InstGraph, InstRef};
use crate::ir::Inst;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl InstGraph {
    /// Render as a Graphviz `digraph`
    ///
    /// Conditional branches label their edges `true`/`false` and switches label theirs with the
    /// case key (or `else` for the default). With `with_catches`, every instruction also gets a
    /// dashed edge to each of its catchers.
    pub fn to_dot(&self, with_catches: bool) -> String {
        let mut dot = String::new();
        dot.push_str("digraph {\n");
        dot.push_str("  node [shape=box, fontname=\"monospace\"];\n\n");

        for (inst_ref, inst) in self.instructions().iter() {
            dot.push_str(&format!(
                "  {} [ label = \"{}\" ]\n",
                inst_ref,
                escape(&inst.to_string())
            ));
        }
        dot.push('\n');

        for (inst_ref, inst) in self.instructions().iter() {
            for (target, label) in self.labelled_successors(inst_ref, inst) {
                match label {
                    Some(label) => dot.push_str(&format!(
                        "  {} -> {} [ label = \"{}\" ]\n",
                        inst_ref,
                        target,
                        escape(&label)
                    )),
                    None => dot.push_str(&format!("  {} -> {}\n", inst_ref, target)),
                }
            }

            if with_catches {
                for catcher in self.catchers(inst_ref) {
                    let label = match self.inst(*catcher) {
                        Inst::Catch(catch) => format!("catch {}", catch.throwable.type_name()),
                        _ => String::from("catch"),
                    };
                    dot.push_str(&format!(
                        "  {} -> {} [ label = \"{}\", style = dashed ]\n",
                        inst_ref,
                        catcher,
                        escape(&label)
                    ));
                }
            }
        }

        dot.push_str("}\n");
        dot
    }

    fn labelled_successors(&self, inst_ref: InstRef, inst: &Inst) -> Vec<(InstRef, Option<String>)> {
        let list = self.instructions();
        let resolve = |label| list.label_target(label).ok();
        match inst {
            Inst::If(branch) => {
                let mut edges = vec![];
                if let Some(target) = resolve(branch.true_branch) {
                    edges.push((target, Some(String::from("true"))));
                }
                if let Some(target) = resolve(branch.false_branch) {
                    edges.push((target, Some(String::from("false"))));
                }
                edges
            }
            Inst::Switch(switch) => {
                let mut edges: Vec<(InstRef, Option<String>)> = switch
                    .branches
                    .iter()
                    .filter_map(|(key, label)| {
                        resolve(*label).map(|target| (target, Some(key.to_string())))
                    })
                    .collect();
                if let Some(target) = resolve(switch.default) {
                    edges.push((target, Some(String::from("else"))));
                }
                edges
            }
            _ => self
                .successors(inst_ref)
                .iter()
                .map(|target| (*target, None))
                .collect(),
        }
    }
}

impl<'g> BlockGraph<'g> {
    /// Render as a Graphviz `digraph`, one left-aligned box of instructions per block
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph {\n");
        dot.push_str("  node [shape=box, fontname=\"monospace\"];\n\n");

        for block in self.refs() {
            let mut label = String::new();
            for inst in self.instructions(block) {
                label.push_str(&escape(&inst.to_string()));
                label.push_str("\\l");
            }
            dot.push_str(&format!("  {} [ label = \"{}\" ]\n", block, label));
        }
        dot.push('\n');

        for block in self.refs() {
            for successor in self.successors(block) {
                dot.push_str(&format!("  {} -> {}\n", block, successor));
            }
            for catcher in self.catchers(block) {
                dot.push_str(&format!("  {} -> {} [ style = dashed ]\n", block, catcher));
            }
        }

        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::SimpleHierarchy;
    use crate::ir::{Constant, LabelRef, LocalVar, SwitchInst, TypeName, Value};

    #[test]
    fn switch_edges() {
        let key = Value::from(LocalVar::generated(0, TypeName::INT));
        let raw = vec![
            Inst::Switch(SwitchInst {
                key,
                branches: vec![
                    (Value::from(Constant::Int(1)), LabelRef(1)),
                    (Value::from(Constant::Int(2)), LabelRef(2)),
                ],
                default: LabelRef(2),
            }),
            Inst::Label(LabelRef(1)),
            Inst::Return(None),
            Inst::Label(LabelRef(2)),
            Inst::Return(Some(Value::from(Constant::String(String::from("quoted"))))),
        ];
        let hierarchy = SimpleHierarchy::new();
        let graph = InstGraph::build(raw, &hierarchy).unwrap();

        let dot = graph.to_dot(false);
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains("i0 -> i1 [ label = \"1\" ]"));
        assert!(dot.contains("i0 -> i2 [ label = \"2\" ]"));
        assert!(dot.contains("i0 -> i2 [ label = \"else\" ]"));
        assert!(dot.contains("\\\"quoted\\\""));
        assert!(!dot.contains("dashed"));

        let blocks = graph.block_graph().to_dot();
        assert!(blocks.contains("bb0 -> bb1"));
        assert!(blocks.contains("bb0 -> bb2"));
        assert!(blocks.ends_with("}\n"));
    }
}
