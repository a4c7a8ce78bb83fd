//! Murcko-style scaffolds computed directly from SMILES strings.
//!
//! The molecule is parsed into an atom/bond graph, then terminal atoms are
//! pruned until only ring systems and the linkers between them remain.  The
//! remaining framework, plus any atom double-bonded to it, is summarised
//! with a few rounds of neighbourhood relabelling.  The key does not depend
//! on where the SMILES string starts, where side chains were written, or
//! whether rings are spelled aromatic (`c1ccccc1`) or Kekulé (`C1=CC=CC=C1`).
//!
//! ```text
//!   Cc1ccccc1CCO  ──parse──▶  graph  ──prune──▶  c1ccccc1  ──relabel──▶  key
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use anyhow::{Context, bail};

const RELABEL_ROUNDS: usize = 4;

// ---------------------------------------------------------------------------
// Molecular graph
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MolGraph {
    atoms: Vec<String>,
    /// `(neighbour, bond symbol)` per atom.
    bonds: Vec<Vec<(usize, char)>>,
}

impl MolGraph {
    fn add_atom(&mut self, symbol: String) -> usize {
        self.atoms.push(symbol);
        self.bonds.push(Vec::new());
        self.atoms.len() - 1
    }

    fn connect(&mut self, a: usize, b: usize, bond: Option<char>) {
        if a == b {
            return;
        }
        let bond = bond.unwrap_or_else(|| {
            if is_aromatic(&self.atoms[a]) && is_aromatic(&self.atoms[b]) {
                ':'
            } else {
                '-'
            }
        });
        self.bonds[a].push((b, bond));
        self.bonds[b].push((a, bond));
    }
}

fn is_aromatic(symbol: &str) -> bool {
    symbol.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}

/// Parse a SMILES string into a graph.  Stereo and charge details are kept as
/// part of the atom symbol for bracket atoms; directional bonds collapse to
/// single bonds.
fn parse_smiles(smiles: &str) -> anyhow::Result<MolGraph> {
    let mut graph = MolGraph::default();
    let chars: Vec<char> = smiles.trim().chars().collect();
    let mut prev: Option<usize> = None;
    let mut branches: Vec<Option<usize>> = Vec::new();
    let mut rings: BTreeMap<u32, (usize, Option<char>)> = BTreeMap::new();
    let mut bond: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                branches.push(prev);
                i += 1;
            }
            ')' => {
                prev = branches.pop().context("unbalanced ')'")?;
                i += 1;
            }
            '-' | '=' | '#' | '$' | ':' => {
                bond = Some(c);
                i += 1;
            }
            '/' | '\\' => {
                bond = Some('-');
                i += 1;
            }
            '.' => {
                prev = None;
                i += 1;
            }
            '0'..='9' | '%' => {
                let (number, width) = if c == '%' {
                    let digits: String = chars.iter().skip(i + 1).take(2).collect();
                    if digits.len() != 2 {
                        bail!("truncated ring number at {i}");
                    }
                    (digits.parse::<u32>().context("ring number")?, 3)
                } else {
                    (c.to_digit(10).unwrap_or_default(), 1)
                };
                let atom = prev.with_context(|| format!("ring bond without atom at {i}"))?;
                match rings.remove(&number) {
                    Some((other, open_bond)) => graph.connect(atom, other, bond.or(open_bond)),
                    None => {
                        rings.insert(number, (atom, bond));
                    }
                }
                bond = None;
                i += width;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .with_context(|| format!("unclosed bracket atom at {i}"))?;
                let inner: String = chars[i + 1..i + end].iter().collect();
                let atom = graph.add_atom(bracket_symbol(&inner));
                if let Some(p) = prev {
                    graph.connect(p, atom, bond.take());
                }
                bond = None;
                prev = Some(atom);
                i += end + 1;
            }
            _ => {
                let two: String = chars.iter().skip(i).take(2).collect();
                let (symbol, width) = if two == "Cl" || two == "Br" {
                    (two, 2)
                } else if matches!(
                    c,
                    'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | 'b' | 'c' | 'n' | 'o' | 'p'
                        | 's' | '*'
                ) {
                    (c.to_string(), 1)
                } else {
                    bail!("unexpected character '{c}' at {i}");
                };
                let atom = graph.add_atom(symbol);
                if let Some(p) = prev {
                    graph.connect(p, atom, bond.take());
                }
                bond = None;
                prev = Some(atom);
                i += width;
            }
        }
    }

    if !branches.is_empty() {
        bail!("unbalanced '('");
    }
    if let Some(number) = rings.keys().next() {
        bail!("ring bond {number} is never closed");
    }
    Ok(graph)
}

/// Element symbol of a bracket atom, dropping isotope, hydrogen count, charge
/// and chirality (scaffolds ignore them).
fn bracket_symbol(inner: &str) -> String {
    let body = inner.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut chars = body.chars();
    let mut symbol = String::new();
    if let Some(first) = chars.next() {
        symbol.push(first);
        if first.is_ascii_uppercase() {
            // `[Co]` keeps the pair, `[CH3]` keeps only the element.
            if let Some(second) = chars.next().filter(|c| c.is_ascii_lowercase()) {
                symbol.push(second);
            }
        }
    }
    symbol
}

// ---------------------------------------------------------------------------
// Framework extraction
// ---------------------------------------------------------------------------

/// Atoms that survive repeated removal of atoms with at most one neighbour.
fn framework(graph: &MolGraph) -> Vec<bool> {
    let mut alive = vec![true; graph.atoms.len()];
    let mut degree: Vec<usize> = graph.bonds.iter().map(Vec::len).collect();
    let mut stack: Vec<usize> = (0..graph.atoms.len()).filter(|&a| degree[a] <= 1).collect();

    while let Some(atom) = stack.pop() {
        if !alive[atom] {
            continue;
        }
        alive[atom] = false;
        for &(nb, _) in &graph.bonds[atom] {
            if alive[nb] {
                degree[nb] -= 1;
                if degree[nb] == 1 {
                    stack.push(nb);
                }
            }
        }
    }
    alive
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Bonds that lie on a cycle among `alive` atoms, as `(low, high)` pairs.
/// A bond is on a cycle when its ends stay connected without it.
fn ring_bonds(graph: &MolGraph, alive: &[bool]) -> BTreeSet<(usize, usize)> {
    let mut rings = BTreeSet::new();
    for a in (0..graph.atoms.len()).filter(|&a| alive[a]) {
        for &(b, _) in &graph.bonds[a] {
            if a < b && alive[b] && connected_without(graph, alive, a, b) {
                rings.insert((a, b));
            }
        }
    }
    rings
}

fn connected_without(graph: &MolGraph, alive: &[bool], from: usize, to: usize) -> bool {
    let mut seen = vec![false; graph.atoms.len()];
    let mut stack = vec![from];
    seen[from] = true;
    while let Some(atom) = stack.pop() {
        for &(nb, _) in &graph.bonds[atom] {
            if (atom == from && nb == to) || !alive[nb] || seen[nb] {
                continue;
            }
            if nb == to {
                return true;
            }
            seen[nb] = true;
            stack.push(nb);
        }
    }
    false
}

fn on_ring(rings: &BTreeSet<(usize, usize)>, a: usize, b: usize) -> bool {
    rings.contains(&(a.min(b), a.max(b)))
}

fn ring_neighbours<'a>(
    graph: &'a MolGraph,
    alive: &'a [bool],
    rings: &'a BTreeSet<(usize, usize)>,
    atom: usize,
) -> impl Iterator<Item = &'a (usize, char)> + 'a {
    graph.bonds[atom]
        .iter()
        .filter(move |&&(nb, _)| alive[nb] && on_ring(rings, atom, nb))
}

/// Ring atoms that take part in a conjugated ring system: aromatic atoms,
/// atoms with a double or aromatic ring bond, and ring heteroatoms sitting
/// between two such atoms (pyrrole-type N, furan-type O).
fn conjugated_atoms(
    graph: &MolGraph,
    alive: &[bool],
    rings: &BTreeSet<(usize, usize)>,
) -> Vec<bool> {
    let mut conj: Vec<bool> = (0..graph.atoms.len())
        .map(|a| {
            alive[a]
                && (is_aromatic(&graph.atoms[a])
                    || ring_neighbours(graph, alive, rings, a)
                        .any(|&(_, bond)| bond == '=' || bond == ':'))
        })
        .collect();
    let lone_pair: Vec<usize> = (0..graph.atoms.len())
        .filter(|&a| alive[a] && !conj[a])
        .filter(|&a| {
            matches!(
                graph.atoms[a].to_ascii_uppercase().as_str(),
                "N" | "O" | "S" | "P"
            )
        })
        .filter(|&a| {
            ring_neighbours(graph, alive, rings, a)
                .filter(|&&(nb, _)| conj[nb])
                .count()
                >= 2
        })
        .collect();
    for a in lone_pair {
        conj[a] = true;
    }
    conj
}

/// Scaffold key of a SMILES string.
///
/// Acyclic molecules all share the empty key `""`.  Atoms double-bonded to the
/// framework (ring `=O`, imine `=N`) are kept.  Element case is folded and
/// bonds inside conjugated rings count as aromatic, so aromatic and Kekulé
/// spellings of one molecule give the same key.  Fails on strings that are
/// not SMILES.
pub fn scaffold_key(smiles: &str) -> anyhow::Result<String> {
    let graph = parse_smiles(smiles).with_context(|| format!("invalid SMILES '{smiles}'"))?;
    let alive = framework(&graph);
    if !alive.contains(&true) {
        return Ok(String::new());
    }

    let rings = ring_bonds(&graph, &alive);
    let conj = conjugated_atoms(&graph, &alive, &rings);
    let mut keep = alive.clone();
    for a in (0..graph.atoms.len()).filter(|&a| !alive[a]) {
        if let [(nb, '=')] = graph.bonds[a].as_slice() {
            keep[a] = alive[*nb];
        }
    }
    let bond_label = |a: usize, b: usize, bond: char| {
        let ring = on_ring(&rings, a, b);
        match bond {
            _ if ring && conj[a] && conj[b] => ':',
            ':' => '-',
            other => other,
        }
    };

    let kept: Vec<usize> = (0..graph.atoms.len()).filter(|&a| keep[a]).collect();
    let mut labels: Vec<u64> = vec![0; graph.atoms.len()];
    for &a in &kept {
        labels[a] = hash_of(&graph.atoms[a].to_ascii_uppercase());
    }
    for _ in 0..RELABEL_ROUNDS {
        let next: Vec<u64> = (0..graph.atoms.len())
            .map(|a| {
                if !keep[a] {
                    return 0;
                }
                let mut around: Vec<(char, u64)> = graph.bonds[a]
                    .iter()
                    .filter(|(nb, _)| keep[*nb])
                    .map(|&(nb, bond)| (bond_label(a, nb, bond), labels[nb]))
                    .collect();
                around.sort_unstable();
                hash_of(&(labels[a], around))
            })
            .collect();
        labels = next;
    }

    let mut signature: Vec<u64> = kept.iter().map(|&a| labels[a]).collect();
    signature.sort_unstable();
    Ok(format!("{}:{:016x}", kept.len(), hash_of(&signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_molecules_share_empty_scaffold() {
        assert_eq!(scaffold_key("CCO").unwrap(), "");
        assert_eq!(scaffold_key("CC(C)CC(=O)O").unwrap(), "");
    }

    #[test]
    fn side_chains_do_not_change_scaffold() {
        let benzene = scaffold_key("c1ccccc1").unwrap();
        assert_eq!(scaffold_key("Cc1ccccc1").unwrap(), benzene);
        assert_eq!(scaffold_key("c1ccccc1CCO").unwrap(), benzene);
        assert_eq!(scaffold_key("OCc1ccc(Cl)cc1").unwrap(), benzene);
        assert!(benzene.starts_with("6:"));
    }

    #[test]
    fn start_position_does_not_change_scaffold() {
        assert_eq!(
            scaffold_key("c1ccncc1C").unwrap(),
            scaffold_key("Cc1cnccc1").unwrap()
        );
    }

    #[test]
    fn linkers_are_kept() {
        let biphenyl_methane = scaffold_key("c1ccccc1Cc1ccccc1").unwrap();
        assert!(biphenyl_methane.starts_with("13:"));
        assert_ne!(biphenyl_methane, scaffold_key("c1ccccc1").unwrap());
    }

    #[test]
    fn distinct_rings_give_distinct_scaffolds() {
        assert_ne!(
            scaffold_key("c1ccccc1").unwrap(),
            scaffold_key("c1ccncc1").unwrap()
        );
        assert_ne!(
            scaffold_key("C1CCCCC1").unwrap(),
            scaffold_key("c1ccccc1").unwrap()
        );
    }

    #[test]
    fn bracket_atoms_and_two_digit_rings_parse() {
        assert!(scaffold_key("[nH]1cccc1").unwrap().starts_with("5:"));
        assert_eq!(
            scaffold_key("C%10CCCCC%10").unwrap(),
            scaffold_key("C1CCCCC1").unwrap()
        );
        assert_eq!(scaffold_key("[Na+].[Cl-]").unwrap(), "");
    }

    #[test]
    fn kekule_and_aromatic_spellings_agree() {
        let key = |s: &str| scaffold_key(s).unwrap();
        assert_eq!(key("c1ccccc1O"), key("C1=CC=CC=C1O"));
        assert_eq!(key("c1ccncc1"), key("C1=CC=NC=C1"));
        assert_eq!(key("c1ccoc1"), key("C1=COC=C1"));
        assert_eq!(key("c1cc[nH]c1"), key("C1=CNC=C1"));
        assert_eq!(key("c1ccccc1c1ccccc1"), key("C1=CC=CC=C1C1=CC=CC=C1"));
        assert_ne!(key("C1=CCCCC1"), key("c1ccccc1"));
        assert_ne!(key("C1=CCCCC1"), key("C1CCCCC1"));
    }

    #[test]
    fn exocyclic_double_bonds_are_kept() {
        let ketone = scaffold_key("O=C1CCCCC1").unwrap();
        assert!(ketone.starts_with("7:"));
        assert_ne!(ketone, scaffold_key("C1CCCCC1").unwrap());
        assert_eq!(ketone, scaffold_key("CC1CCCC(=O)C1").unwrap());
        // acid groups on a ring are side chains, not part of the framework
        assert_eq!(
            scaffold_key("OC(=O)c1ccccc1").unwrap(),
            scaffold_key("c1ccccc1").unwrap()
        );
    }

    #[test]
    fn invalid_smiles_fail() {
        assert!(scaffold_key("c1cccc").is_err());
        assert!(scaffold_key("C(C").is_err());
        assert!(scaffold_key("not a molecule").is_err());
    }
}
