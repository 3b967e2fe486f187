//! Interval analysis (§4.3): per-variable bound pair (lo,hi) refined on
//! conditional-branch edges.
//!
//! This is the one analysis in the module that is not a thin
//! [`crate::dataflow::Analysis`] impl: its merge step needs to inspect
//! which *edge* a value is flowing across (is this predecessor's branch
//! taking us down the true or the false successor?) to apply the
//! `lt`/`ge` narrowing, which the generic engine's `merge(values: Vec<&D>)`
//! signature -- deliberately edge-blind, to keep every other analysis
//! simple -- cannot express. It runs its own bounded worklist instead.

use std::collections::{HashMap, VecDeque};

use lmlang_core::{Arg, BlockId, Cfg, Function, Literal, Op};

pub type Interval = (i64, i64);
pub type IntervalMap = HashMap<String, Interval>;

const INT32_MIN: i64 = i32::MIN as i64;
const INT32_MAX: i64 = i32::MAX as i64;

fn full_range() -> Interval {
    (INT32_MIN, INT32_MAX)
}

fn interval_of(map: &IntervalMap, name: &str) -> Interval {
    *map.get(name).unwrap_or(&full_range())
}

fn is_empty(i: Interval) -> bool {
    i.0 > i.1
}

/// Narrows `(l, r)` for an `l < r` condition known to hold.
fn lt(l: Interval, r: Interval) -> (Interval, Interval) {
    ((l.0, l.1.min(r.1 - 1)), (r.0.max(l.0 + 1), r.1))
}

/// Narrows `(l, r)` for an `l < r` condition known to be false, i.e. `l >= r`.
fn ge(l: Interval, r: Interval) -> (Interval, Interval) {
    ((l.0.max(r.0), l.1), (r.0, r.1.min(l.1)))
}

pub struct IntervalResults {
    pub in_values: HashMap<BlockId, IntervalMap>,
    pub out_values: HashMap<BlockId, IntervalMap>,
}

impl IntervalResults {
    pub fn in_at(&self, block: BlockId) -> &IntervalMap {
        &self.in_values[&block]
    }

    pub fn out_at(&self, block: BlockId) -> &IntervalMap {
        &self.out_values[&block]
    }
}

fn eval_instruction(instr: &lmlang_core::Instruction, state: &IntervalMap) -> IntervalMap {
    let mut out = state.clone();
    let Some(dest) = &instr.dest else { return out };
    match instr.op {
        Op::Lit => {
            if let Some(Arg::Literal(lit)) = instr.args.first() {
                let v = match lit {
                    Literal::Int(v) => Some(*v),
                    Literal::Bool(b) => Some(*b as i64),
                    _ => None,
                };
                if let Some(v) = v {
                    out.insert(dest.clone(), (v, v));
                }
            }
        }
        Op::Add => {
            if let [a, b] = instr.refs.as_slice() {
                let (ia, ib) = (interval_of(state, a), interval_of(state, b));
                out.insert(dest.clone(), (ia.0 + ib.0, ia.1 + ib.1));
            }
        }
        Op::Sub => {
            if let [a, b] = instr.refs.as_slice() {
                let (ia, ib) = (interval_of(state, a), interval_of(state, b));
                out.insert(dest.clone(), (ia.0 - ib.1, ia.1 - ib.0));
            }
        }
        Op::Mul => {
            if let [a, b] = instr.refs.as_slice() {
                let (ia, ib) = (interval_of(state, a), interval_of(state, b));
                let corners = [ia.0 * ib.0, ia.0 * ib.1, ia.1 * ib.0, ia.1 * ib.1];
                let lo = corners.iter().copied().min().unwrap();
                let hi = corners.iter().copied().max().unwrap();
                out.insert(dest.clone(), (lo, hi));
            }
        }
        Op::Lt => {
            if let [a, b] = instr.refs.as_slice() {
                let (ia, ib) = (interval_of(state, a), interval_of(state, b));
                let v = if ia.1 < ib.0 {
                    (1, 1)
                } else if ia.0 >= ib.1 {
                    (0, 0)
                } else {
                    (0, 1)
                };
                out.insert(dest.clone(), v);
            }
        }
        _ => {}
    }
    out
}

fn transfer_block(block: &lmlang_core::BasicBlock, in_map: &IntervalMap) -> IntervalMap {
    let mut state = in_map.clone();
    for instr in &block.instructions {
        state = eval_instruction(instr, &state);
    }
    state
}

/// Finds the `refs` of the instruction in `block` that defines `name`
/// with op `Lt`, if any -- the comparison this branch's narrowing is
/// keyed on. Only `Lt` conditions are narrowed (per §4.3, non-`Lt`
/// comparisons reaching a branch condition are left unrefined -- a
/// sound over-approximation -- rather than rejected).
fn lt_operands<'a>(block: &'a lmlang_core::BasicBlock, name: &str) -> Option<(&'a str, &'a str)> {
    block.instructions.iter().rev().find_map(|i| {
        if i.dest.as_deref() == Some(name) && i.op == Op::Lt {
            match i.refs.as_slice() {
                [a, b] => Some((a.as_str(), b.as_str())),
                _ => None,
            }
        } else {
            None
        }
    })
}

/// The value a predecessor `pred` contributes to `block` across the CFG
/// edge, with branch-condition narrowing applied when `pred`'s
/// terminator is a `Br` whose condition is an `Lt` comparison.
fn edge_value(function: &Function, pred: BlockId, block: BlockId, pred_out: &IntervalMap) -> IntervalMap {
    let pred_block = &function.blocks[pred.index()];
    if pred_block.terminator.op != Op::Br {
        return pred_out.clone();
    }
    let (if_true, if_false) = pred_block.terminator.branch_targets();
    let cond = &pred_block.terminator.refs[0];
    let Some((a, b)) = lt_operands(pred_block, cond) else {
        return pred_out.clone();
    };
    let (ia, ib) = (interval_of(pred_out, a), interval_of(pred_out, b));

    let mut out = pred_out.clone();
    if block.index() as u32 == if_true {
        let (na, nb) = lt(ia, ib);
        if is_empty(na) || is_empty(nb) {
            out.insert(cond.clone(), (0, 0));
        } else {
            out.insert(a.to_string(), na);
            out.insert(b.to_string(), nb);
        }
    } else if block.index() as u32 == if_false {
        let (na, nb) = ge(ia, ib);
        if is_empty(na) || is_empty(nb) {
            out.insert(cond.clone(), (1, 1));
        } else {
            out.insert(a.to_string(), na);
            out.insert(b.to_string(), nb);
        }
    }
    out
}

fn union(maps: &[IntervalMap]) -> IntervalMap {
    let mut merged: IntervalMap = HashMap::new();
    for map in maps {
        for (name, interval) in map {
            merged
                .entry(name.clone())
                .and_modify(|acc: &mut Interval| {
                    acc.0 = acc.0.min(interval.0);
                    acc.1 = acc.1.max(interval.1);
                })
                .or_insert(*interval);
        }
    }
    merged
}

/// Runs interval analysis to a fixed point, or until `iteration_cap`
/// re-visits of any single block are exhausted -- the one analysis
/// allowed to terminate early without full convergence (§4.2, §9).
pub fn run(function: &Function, iteration_cap: usize) -> IntervalResults {
    let cfg = Cfg::build(function);
    let n = function.blocks.len();

    let entry_map: IntervalMap = function.params.iter().map(|(name, _)| (name.clone(), full_range())).collect();

    let mut in_values: Vec<IntervalMap> = vec![HashMap::new(); n];
    let mut out_values: Vec<IntervalMap> = vec![HashMap::new(); n];
    let mut visits = vec![0usize; n];

    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut first = true;

    while let Some(bi) = queue.pop_front() {
        if visits[bi] >= iteration_cap {
            continue;
        }
        visits[bi] += 1;

        let block = BlockId(bi as u32);
        let preds = cfg.predecessors(block);

        let in_map = if first || preds.is_empty() {
            entry_map.clone()
        } else {
            let contributions: Vec<IntervalMap> =
                preds.iter().map(|p| edge_value(function, *p, block, &out_values[p.index()])).collect();
            union(&contributions)
        };
        first = false;

        in_values[bi] = in_map.clone();
        let out_map = transfer_block(&function.blocks[bi], &in_map);

        if out_map != out_values[bi] {
            out_values[bi] = out_map;
            for succ in cfg.successors(block) {
                queue.push_back(succ.index());
            }
        }
    }

    let in_values = in_values.into_iter().enumerate().map(|(i, v)| (BlockId(i as u32), v)).collect();
    let out_values = out_values.into_iter().enumerate().map(|(i, v)| (BlockId(i as u32), v)).collect();
    IntervalResults { in_values, out_values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Instruction};

    /// §8 scenario 5: `for x in [0,10) { x := x + 1 }`.
    fn counted_loop() -> Function {
        let mut entry = BasicBlock::new("entry", Instruction::jmp(1));
        entry.push(Instruction::lit("x", Literal::Int(0)));

        let mut header = BasicBlock::new("header", Instruction::br("cond", 2, 3));
        header.push(Instruction::lit("ten", Literal::Int(10)));
        header.push(Instruction::lt("cond", "x", "ten"));

        let mut body = BasicBlock::new("body", Instruction::jmp(1));
        body.push(Instruction::lit("one", Literal::Int(1)));
        body.push(Instruction::add("x", "x", "one"));

        let end = BasicBlock::new("end", Instruction::ret(vec![]));

        Function::new("f", vec![], vec![], vec![entry, header, body, end])
    }

    #[test]
    fn loop_body_entry_interval_matches_spec_scenario() {
        let f = counted_loop();
        let results = run(&f, 256);
        assert_eq!(results.in_at(BlockId(2)).get("x"), Some(&(0, 9)));
    }

    #[test]
    fn loop_exit_interval_matches_spec_scenario() {
        let f = counted_loop();
        let results = run(&f, 256);
        assert_eq!(results.in_at(BlockId(3)).get("x"), Some(&(10, 10)));
    }
}
