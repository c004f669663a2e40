//! From extracted table rows to canonical instruction forms.

use super::error::Error;
use super::listing::Table;
use super::operands::{self, OperandSpec};
use super::{fixups, Options, Stats};
use crate::encoding::Encoding;
use crate::instruction::{
    is_valid_identifier, Instruction, Operand, OperandEncoding, OperandType, TupleType,
};
use crate::register::RegisterClass;

/// One row of a mnemonic table, after normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct MnemonicRow {
    pub page: u32,
    pub opcode: String,
    pub instruction: String,
    pub openc: String,
    pub mode64: bool,
    pub mode32: bool,
    pub cpuid: Vec<String>,
}

/// One row of an operand-encoding table.
#[derive(Debug, Clone, PartialEq)]
pub struct OpEnRow {
    pub id: String,
    pub tuple: TupleType,
    pub cells: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum ColKind {
    OpcodeInstruction,
    Opcode,
    Instruction,
    OpEn,
    ModeBoth,
    Mode64,
    Mode32,
    Cpuid,
    Other,
}

fn classify_heading(text: &str) -> ColKind {
    let text = text.trim();
    if text.contains("Opcode") && text.contains("Instruction") {
        ColKind::OpcodeInstruction
    } else if text.starts_with("Opcode") {
        ColKind::Opcode
    } else if text.starts_with("Instruction") {
        ColKind::Instruction
    } else if text.contains("Op/En") || text.contains("Op / En") || text.contains("Op En") {
        ColKind::OpEn
    } else if text.contains("64/32") {
        ColKind::ModeBoth
    } else if text.contains("64-Bit") || text.contains("64-bit Mode") {
        ColKind::Mode64
    } else if text.contains("Compat") || text.contains("Leg Mode") {
        ColKind::Mode32
    } else if text.contains("CPUID") {
        ColKind::Cpuid
    } else {
        ColKind::Other
    }
}

/// Encoding-grammar words that can never start an instruction name, used
/// when prying apart a combined Opcode/Instruction cell.
const ENCODING_WORDS: &[&str] = &[
    "NP", "NFx", "REX", "REX.R", "REX.W", "cb", "cw", "cd", "cp", "co", "ct", "ib", "iw", "id",
    "io",
];

fn is_hex_pair(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn looks_like_mnemonic(token: &str) -> bool {
    if token.len() < 2 || is_hex_pair(token) || ENCODING_WORDS.contains(&token) {
        return false;
    }
    if token.contains('.') || token.contains('/') || token.contains('+') {
        return false;
    }
    let mut chars = token.chars();
    chars.next().map_or(false, |c| c.is_ascii_uppercase())
        && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Splits a combined `Opcode/Instruction` cell at the mnemonic.
fn split_opcode_instruction(cell: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = cell.split_whitespace().collect();
    let at = tokens.iter().position(|t| looks_like_mnemonic(t))?;
    if at == 0 {
        return None;
    }
    Some((tokens[..at].join(" "), tokens[at..].join(" ")))
}

/// Turns a mnemonic [`Table`] into normalised rows, applying the
/// correction tables along the way.
pub fn mnemonic_rows(
    page: u32,
    table: &Table,
    stats: &mut Stats,
) -> Result<Vec<MnemonicRow>, Error> {
    let kinds: Vec<ColKind> = table.heading.iter().map(|h| classify_heading(h)).collect();
    if !kinds.iter().any(|k| {
        matches!(k, ColKind::Opcode | ColKind::OpcodeInstruction)
    }) {
        return Err(Error::at(page, "mnemonic table has no opcode column"));
    }

    let mut rows = Vec::new();
    for cells in &table.rows {
        let mut opcode = String::new();
        let mut instruction = String::new();
        let mut openc = String::new();
        let mut mode64 = true;
        let mut mode32 = true;
        let mut cpuid = String::new();

        for (kind, cell) in kinds.iter().zip(cells.iter()) {
            let cell = cell.trim();
            match kind {
                ColKind::OpcodeInstruction => match split_opcode_instruction(cell) {
                    Some((op, insn)) => {
                        opcode = op;
                        instruction = insn;
                    }
                    None => {
                        stats.listing_errors += 1;
                        log::warn!("p.{}: cannot split opcode/instruction `{}`", page, cell);
                    }
                },
                ColKind::Opcode => opcode = cell.to_string(),
                ColKind::Instruction => instruction = cell.to_string(),
                ColKind::OpEn => openc = cell.to_string(),
                ColKind::ModeBoth => {
                    let mut parts = cell.splitn(2, '/');
                    if let Some(v) = parts.next().and_then(fixups::mode_validity) {
                        mode64 = v;
                    }
                    if let Some(v) = parts.next().and_then(fixups::mode_validity) {
                        mode32 = v;
                    }
                }
                ColKind::Mode64 => {
                    if let Some(v) = fixups::mode_validity(cell) {
                        mode64 = v;
                    }
                }
                ColKind::Mode32 => {
                    if let Some(v) = fixups::mode_validity(cell) {
                        mode32 = v;
                    }
                }
                ColKind::Cpuid => cpuid = cell.to_string(),
                ColKind::Other => {}
            }
        }

        if opcode.is_empty() || instruction.is_empty() {
            continue;
        }

        let (mut opcode, opcode_fixed) = fixups::fix_opcode(&opcode);
        let (mut instruction, instruction_fixed) = fixups::fix_instruction(&instruction);
        let (cpuid, cpuid_fixed) = fixups::fix_cpuid(&cpuid);
        let (openc, openc_fixed) = fixups::fix_openc(&openc);
        if opcode_fixed || instruction_fixed || cpuid_fixed || openc_fixed {
            stats.instruction_errors += 1;
        }

        if let Some(repair) = fixups::manual_error(&instruction, &opcode) {
            if let Some(fixed) = repair.fixed_opcode {
                opcode = fixed.to_string();
            }
            if let Some(fixed) = repair.fixed_instruction {
                instruction = fixed.to_string();
            }
            stats.instruction_errors += 1;
            log::debug!("p.{}: repaired manual error in `{}`", page, instruction);
        }

        // The one V/N.E. misprint: the 64-bit CMOVG form is valid in
        // 64-bit mode only.
        if instruction == "CMOVG r64, r/m64" && !mode64 && mode32 {
            std::mem::swap(&mut mode64, &mut mode32);
        }

        rows.push(MnemonicRow {
            page,
            opcode,
            instruction,
            openc,
            mode64,
            mode32,
            cpuid: cpuid.split_whitespace().map(str::to_string).collect(),
        });
    }
    Ok(rows)
}

/// Collapses consecutive rows that differ only by a REX/REX.W prefix on
/// the opcode; the prefixed form is implied at runtime.
pub fn dedupe_rex_rows(rows: &mut Vec<MnemonicRow>, stats: &mut Stats) {
    let mut i = 1;
    while i < rows.len() {
        let (earlier, later) = (&rows[i - 1], &rows[i]);
        let drop_later = earlier.instruction == later.instruction
            && (later.opcode == format!("REX {}", earlier.opcode)
                || later.opcode == format!("REX.W {}", earlier.opcode));
        let drop_earlier = earlier.instruction == later.instruction
            && (earlier.opcode == format!("REX {}", later.opcode)
                || earlier.opcode == format!("REX.W {}", later.opcode));
        if drop_later {
            rows.remove(i);
            stats.duplicates_dropped += 1;
        } else if drop_earlier {
            rows.remove(i - 1);
            stats.duplicates_dropped += 1;
        } else {
            i += 1;
        }
    }
}

/// Mnemonics whose rows never become instruction forms.
pub fn is_ignored_mnemonic(mnemonic: &str) -> bool {
    matches!(
        mnemonic,
        "LOCK" | "REP" | "REPE" | "REPZ" | "REPNE" | "REPNZ"
    ) || mnemonic.starts_with("GETSEC[")
}

/// Turns an operand-encoding [`Table`] into rows. A duplicated Op/En
/// identifier is a listing error; the first definition wins.
pub fn openc_rows(page: u32, table: &Table, stats: &mut Stats) -> Vec<OpEnRow> {
    let mut id_col = None;
    let mut tuple_col = None;
    let mut operand_cols = Vec::new();
    for (i, heading) in table.heading.iter().enumerate() {
        let heading = heading.trim();
        if heading == "Op/En" {
            id_col = Some(i);
        } else if heading.starts_with("Tuple") {
            tuple_col = Some(i);
        } else if heading.starts_with("Operand") {
            operand_cols.push(i);
        }
    }
    let id_col = match id_col {
        Some(col) => col,
        None => return Vec::new(),
    };

    let mut rows: Vec<OpEnRow> = Vec::new();
    for cells in &table.rows {
        let id = match cells.get(id_col) {
            Some(id) if !id.trim().is_empty() => fixups::fix_openc(id).0,
            _ => continue,
        };
        if rows.iter().any(|r| r.id == id) {
            stats.listing_errors += 1;
            log::warn!("p.{}: duplicate Op/En identifier `{}`", page, id);
            continue;
        }
        let tuple = tuple_col
            .and_then(|col| cells.get(col))
            .and_then(|cell| TupleType::from_manual(cell))
            .unwrap_or(TupleType::None);
        let cells = operand_cols
            .iter()
            .filter_map(|&col| cells.get(col).cloned())
            .collect();
        rows.push(OpEnRow { id, tuple, cells });
    }
    rows
}

/// Interprets one cell of the operand-encoding table.
fn parse_role(cell: &str) -> Option<OperandEncoding> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "NA" || cell == "N/A" {
        return None;
    }
    Some(if cell.contains("ModRM:reg") {
        OperandEncoding::ModRmReg
    } else if cell.contains("ModRM:r/m") {
        OperandEncoding::ModRmRm
    } else if cell.contains("imm8[7:4]") {
        OperandEncoding::VexIs4
    } else if cell.contains("vvvv") {
        OperandEncoding::VexVvvv
    } else if cell.contains("VSIB") {
        OperandEncoding::Vsib
    } else if cell.contains("SIB") {
        OperandEncoding::Sib
    } else if cell.contains("opcode") {
        OperandEncoding::OpcodePlusReg
    } else if cell.contains("Moffs") || cell.contains("moffs") {
        OperandEncoding::Displacement
    } else if cell.contains("Offset") {
        OperandEncoding::CodeOffset
    } else if cell.contains("imm") {
        OperandEncoding::Immediate
    } else if cell.contains("Implicit") {
        OperandEncoding::Implicit
    } else {
        // Fixed registers spell themselves out (AL/AX/EAX/RAX).
        OperandEncoding::None
    })
}

#[derive(Default)]
struct Decorations {
    mask: bool,
    zero: bool,
    rounding: bool,
    sae: bool,
}

/// Strips `{k1}`, `{z}`, `{er}`, `{sae}` from an operand, recording which
/// were present.
fn strip_decorations(operand: &str, decorations: &mut Decorations) -> String {
    let mut out = String::new();
    let mut rest = operand;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let close = match rest[open..].find('}') {
            Some(close) => open + close,
            None => break,
        };
        match &rest[open + 1..close] {
            "z" => decorations.zero = true,
            "er" => decorations.rounding = true,
            "sae" => decorations.sae = true,
            k if k.starts_with('k') => decorations.mask = true,
            _ => {}
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// The alternatives an operand name expands to. Most names are themselves;
/// `r/m32` and friends split into independent forms.
fn alternatives(name: &str) -> Vec<String> {
    if !name.contains('/') || operands::NO_SPLIT.contains(&name) {
        return vec![name.to_string()];
    }
    if let Some(suffix) = name.strip_prefix("r/m") {
        return vec![format!("r{}", suffix), format!("m{}", suffix)];
    }
    name.split('/').map(str::to_string).collect()
}

/// String instructions give their memory operands direction-specific
/// types.
fn string_operand_type(mnemonic: &str, position: usize, fallback: OperandType) -> OperandType {
    if fallback != OperandType::Memory {
        return fallback;
    }
    match mnemonic {
        "movs" | "cmps" => {
            if position == 0 {
                OperandType::StringDestinationMemory
            } else {
                OperandType::StringSourceMemory
            }
        }
        "stos" | "scas" | "ins" => OperandType::StringDestinationMemory,
        "lods" | "outs" => OperandType::StringSourceMemory,
        _ => fallback,
    }
}

/// Builds the instruction forms for one mnemonic row. An operand spelled
/// with alternatives yields one form per alternative; at most one operand
/// may split.
pub fn forms_from_row(
    row: &MnemonicRow,
    openc: Option<&OpEnRow>,
    options: &Options,
    stats: &mut Stats,
) -> Result<Vec<Instruction>, Error> {
    let page = row.page;
    let mut encoding = Encoding::parse(&row.opcode).map_err(|err| {
        Error::with_cause(page, format!("bad encoding `{}`", row.opcode), err)
    })?;

    let (mnemonic, operand_text) = match row.instruction.split_once(' ') {
        Some((m, rest)) => (m.to_string(), rest.trim().to_string()),
        None => (row.instruction.clone(), String::new()),
    };
    let mnemonic = mnemonic.to_ascii_lowercase();

    // Operand names, decorations stripped. A bare `{sae}`/`{er}` entry
    // annotates the form without adding an operand.
    let mut decorations = Decorations::default();
    let mut names: Vec<String> = Vec::new();
    for part in operand_text.split(',') {
        let name = strip_decorations(part.trim(), &mut decorations);
        if !name.is_empty() {
            names.push(name);
        }
    }
    if names.len() > 4 {
        return Err(Error::at(
            page,
            format!("`{}` declares more than four operands", row.instruction),
        ));
    }

    if encoding.evex {
        encoding.evex_mask = decorations.mask;
        encoding.evex_zero = decorations.zero;
        encoding.evex_rounding = decorations.rounding;
        encoding.evex_sae = decorations.sae;
    }

    // Find the splitting operand, if any.
    let mut split_at = None;
    for (i, name) in names.iter().enumerate() {
        if alternatives(name).len() > 1 {
            if split_at.is_some() {
                return Err(Error::at(
                    page,
                    format!("`{}` has more than one splitting operand", row.instruction),
                ));
            }
            split_at = Some(i);
        }
    }

    let variants: Vec<Vec<String>> = match split_at {
        None => vec![names],
        Some(at) => {
            let alts = alternatives(&names[at]);
            stats.splits += alts.len() as u32 - 1;
            alts.into_iter()
                .map(|alt| {
                    let mut variant = names.clone();
                    variant[at] = alt;
                    variant
                })
                .collect()
        }
    };

    let mut forms = Vec::new();
    for variant in variants {
        let mut form = build_form(
            page,
            &mnemonic,
            &row.instruction,
            encoding.clone(),
            &variant,
            openc,
            row,
        )?;

        // Gather and scatter listings do not consistently carry /vsib.
        if options.vsib_fix
            && !form.encoding.vsib
            && form
                .operands()
                .any(|op| op.encoding == OperandEncoding::Vsib)
        {
            log::warn!("p.{}: adding missing /vsib to `{}`", page, row.instruction);
            form.encoding.vsib = true;
            form.encoding.modrm = true;
            stats.vsib_fixes += 1;
        }

        forms.push(form);
    }
    Ok(forms)
}

fn build_form(
    page: u32,
    mnemonic: &str,
    syntax: &str,
    encoding: Encoding,
    names: &[String],
    openc: Option<&OpEnRow>,
    row: &MnemonicRow,
) -> Result<Instruction, Error> {
    let mut operands: [Option<Operand>; 4] = [None, None, None, None];
    let mut min_args = 0u8;
    let mut max_args = 0u8;
    let mut long_mode_only = encoding.rex;

    for (i, name) in names.iter().enumerate() {
        let spec: &OperandSpec = operands::find(name).ok_or_else(|| {
            Error::at(page, format!("unknown operand `{}` in `{}`", name, syntax))
        })?;

        let cell_role = openc.and_then(|o| o.cells.get(i)).and_then(|c| parse_role(c));
        let role = spec.role.or(cell_role).unwrap_or(OperandEncoding::None);

        if spec.operand_type == OperandType::Register
            && spec.bits == 64
            && spec
                .registers
                .first()
                .map_or(false, |r| r.register().class() == RegisterClass::GeneralPurpose)
        {
            long_mode_only = true;
        }

        max_args += 1;
        if role != OperandEncoding::Implicit {
            min_args += 1;
        }

        operands[i] = Some(Operand {
            name: name.clone(),
            syntax: name.clone(),
            uid: spec.uid.to_string(),
            encoding: role,
            operand_type: string_operand_type(mnemonic, i, spec.operand_type),
            bits: spec.bits,
            registers: spec.registers.to_vec(),
        });
    }

    let tuple_type = openc.map(|o| o.tuple).unwrap_or(TupleType::None);
    let mode64 = row.mode64;
    let mode32 = row.mode32 && !long_mode_only;
    let mode16 = row.mode32 && !long_mode_only;

    Ok(Instruction {
        page,
        mnemonic: mnemonic.to_string(),
        uid: String::new(),
        syntax: syntax.to_string(),
        address_size: encoding.mandatory_prefixes.contains(&0x67),
        encoding,
        tuple_type,
        min_args,
        max_args,
        operands,
        mode64,
        mode32,
        mode16,
        cpuid: row.cpuid.clone(),
        operand_size: false,
        data_size: 0,
    })
}

/// Marks the forms that belong to an operand-size-override family: same
/// opcode bytes and prefixes once code-offset and immediate widths are
/// out of the picture, same mnemonic, intersecting mode validity.
pub fn detect_operand_size(forms: &mut [Instruction]) {
    use std::collections::HashMap;

    let key = |form: &Instruction| -> String {
        let enc = &form.encoding;
        format!(
            "{:?}|{:?}|{:?}|{:?}|{}{}{}{}",
            enc.mandatory_prefixes,
            enc.opcodes,
            enc.modrm_reg,
            enc.register_modifier,
            enc.vex,
            enc.evex,
            enc.vex_pp,
            enc.vex_m_mmmm,
        )
    };

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, form) in forms.iter().enumerate() {
        groups.entry(key(form)).or_default().push(i);
    }

    for group in groups.values() {
        for (gi, &i) in group.iter().enumerate() {
            for &j in &group[gi + 1..] {
                let (a, b) = (&forms[i], &forms[j]);
                let intersects = (a.mode64 && b.mode64)
                    || (a.mode32 && b.mode32)
                    || (a.mode16 && b.mode16);
                if a.mnemonic == b.mnemonic && intersects {
                    forms[i].operand_size = true;
                    forms[j].operand_size = true;
                }
            }
        }
    }
}

/// Renames the far control-transfer forms: an operand containing `:` or
/// the CB/`CA iw` opcodes mark a far variant.
pub fn rename_far_forms(forms: &mut [Instruction]) {
    for form in forms.iter_mut() {
        if !matches!(form.mnemonic.as_str(), "call" | "jmp" | "ret") {
            continue;
        }
        let far_operand = form.operands().any(|op| op.name.contains(':'));
        let far_opcode = form.encoding.opcodes == [0xCB] || form.encoding.opcodes == [0xCA];
        if far_operand || far_opcode {
            form.mnemonic.push_str("-far");
        }
    }
}

/// Data-operation sizes that cannot be read off the operands.
#[rustfmt::skip]
const DATA_SIZES: &[(&str, u16)] = &[
    // String operations; their suffix is not a scalar-width suffix.
    ("movsb", 8), ("movsw", 16), ("movsq", 64),
    ("cmpsb", 8), ("cmpsw", 16), ("cmpsq", 64),
    ("stosb", 8), ("stosw", 16), ("stosd", 32), ("stosq", 64),
    ("lodsb", 8), ("lodsw", 16), ("lodsd", 32), ("lodsq", 64),
    ("scasb", 8), ("scasw", 16), ("scasd", 32), ("scasq", 64),
    ("insb", 8), ("insw", 16), ("insd", 32),
    ("outsb", 8), ("outsw", 16), ("outsd", 32),
    // Doubly-ambiguous mnemonics: MOVSD/CMPSD are both string and SSE
    // instructions; the SSE forms are recognised by their prefixes.
    ("movd", 32), ("movq", 64),
    ("pop", 0), ("push", 0),
];

/// Infers the per-form data-operation size: the enumerated table first,
/// then the scalar suffix for vector forms, then the first operand when
/// the form is operand-size sensitive.
pub fn infer_data_sizes(forms: &mut [Instruction]) {
    for form in forms.iter_mut() {
        if let Some(&(_, bits)) = DATA_SIZES.iter().find(|(m, _)| *m == form.mnemonic) {
            if bits > 0 {
                form.data_size = bits;
                continue;
            }
        }

        let scalar = form.tuple_type == TupleType::Tuple1Scalar
            || form.encoding.vex
            || form.encoding.evex;
        if scalar {
            let suffix_bits = if form.mnemonic.ends_with("ss") {
                32
            } else if form.mnemonic.ends_with("sd") {
                64
            } else if form.mnemonic.ends_with("sh") {
                16
            } else {
                0
            };
            if suffix_bits > 0 {
                form.data_size = suffix_bits;
                continue;
            }
            if form.tuple_type == TupleType::Tuple1Scalar {
                // No suffix to read; fall back to the narrowest memory
                // operand, which is the element the scalar op touches.
                form.data_size = form
                    .operands()
                    .filter(|op| op.operand_type == OperandType::Memory && op.bits > 0)
                    .map(|op| op.bits)
                    .min()
                    .unwrap_or(0);
                continue;
            }
        }

        if form.operand_size || form.encoding.rex {
            let data_size = form.operands().next().map(|op| op.bits).unwrap_or(0);
            form.data_size = data_size;
        }
    }
}

/// Duplicate UIDs the manual legitimately produces; later copies are
/// dropped.
fn duplicate_exempt(uid: &str) -> bool {
    uid == "LEAVE"
        || uid.starts_with("JZ_REL")
        || uid.starts_with("VMOVQ")
        || uid == "SMSW_M16"
}

/// Derives and validates every form's UID, dropping exempted duplicates.
/// An unexempted duplicate is fatal.
pub fn finalize_uids(
    forms: Vec<Instruction>,
    stats: &mut Stats,
) -> Result<Vec<Instruction>, Error> {
    use std::collections::HashSet;

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(forms.len());
    for mut form in forms {
        form.uid = form.derive_uid();
        if !is_valid_identifier(&form.uid) {
            return Err(Error::at(
                form.page,
                format!("UID `{}` is not a valid identifier", form.uid),
            ));
        }
        if !seen.insert(form.uid.clone()) {
            if duplicate_exempt(&form.uid) {
                stats.duplicates_dropped += 1;
                continue;
            }
            return Err(Error::at(
                form.page,
                format!("duplicate UID `{}`", form.uid),
            ));
        }
        out.push(form);
    }
    Ok(out)
}

/// Verifies every database invariant. Called once after sorting; any
/// violation is fatal.
pub fn verify(forms: &[Instruction]) -> Result<(), Error> {
    for form in forms {
        let fail = |message: String| Err(Error::at(form.page, message));
        let enc = &form.encoding;

        match Encoding::parse(&enc.syntax) {
            Ok(reparsed) if &reparsed == enc => {}
            _ => return fail(format!("`{}`: encoding does not round-trip", form.uid)),
        }

        if enc.rex && (form.mode32 || form.mode16) {
            return fail(format!("`{}`: REX form valid outside 64-bit mode", form.uid));
        }
        if form.tuple_type != TupleType::None && !enc.evex {
            return fail(format!("`{}`: tuple type without EVEX", form.uid));
        }
        if form.tuple_type == TupleType::Tuple1Scalar && form.data_size == 0 {
            return fail(format!("`{}`: tuple1-scalar without a data size", form.uid));
        }

        let mut immediate_bits = 0u16;
        for operand in form.operands() {
            match operand.encoding {
                OperandEncoding::ModRmReg => {
                    if !enc.modrm {
                        return fail(format!("`{}`: modrm-reg operand without ModR/M", form.uid));
                    }
                    if enc.modrm_reg.is_some() {
                        return fail(format!(
                            "`{}`: operand duplicates the fixed ModR/M.reg",
                            form.uid
                        ));
                    }
                }
                OperandEncoding::ModRmRm | OperandEncoding::Vsib | OperandEncoding::Sib => {
                    if !enc.modrm {
                        return fail(format!("`{}`: r/m operand without ModR/M", form.uid));
                    }
                }
                OperandEncoding::OpcodePlusReg => {
                    if enc.register_modifier.is_none() {
                        return fail(format!(
                            "`{}`: opcode-embedded operand without a register modifier",
                            form.uid
                        ));
                    }
                }
                OperandEncoding::StackIndex => {
                    if enc.stack_index_modifier.is_none() {
                        return fail(format!(
                            "`{}`: stack-index operand without an opcode modifier",
                            form.uid
                        ));
                    }
                }
                OperandEncoding::CodeOffset => {
                    if operand.bits != u16::from(enc.code_offset_bytes) * 8 {
                        return fail(format!(
                            "`{}`: code-offset width {} does not match the encoding",
                            form.uid, operand.bits
                        ));
                    }
                }
                OperandEncoding::Immediate => immediate_bits += operand.bits,
                _ => {}
            }

            let register_typed = matches!(
                operand.operand_type,
                OperandType::Register | OperandType::StackIndex
            );
            if register_typed && operand.registers.is_empty() {
                return fail(format!(
                    "`{}`: register operand `{}` resolves to nothing",
                    form.uid, operand.name
                ));
            }
            if register_typed
                && operand.bits == 64
                && operand
                    .registers
                    .first()
                    .map_or(false, |r| r.register().class() == RegisterClass::GeneralPurpose)
                && (form.mode32 || form.mode16)
            {
                return fail(format!(
                    "`{}`: 64-bit register form valid outside 64-bit mode",
                    form.uid
                ));
            }
        }

        if immediate_bits != u16::from(enc.immediate_bytes) * 8 {
            return fail(format!(
                "`{}`: immediate width {} does not match the encoding's {} bytes",
                form.uid, immediate_bits, enc.immediate_bytes
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(opcode: &str, instruction: &str, openc: &str) -> MnemonicRow {
        MnemonicRow {
            page: 7,
            opcode: opcode.to_string(),
            instruction: instruction.to_string(),
            openc: openc.to_string(),
            mode64: true,
            mode32: true,
            cpuid: Vec::new(),
        }
    }

    fn rm_openc() -> OpEnRow {
        OpEnRow {
            id: "RM".to_string(),
            tuple: TupleType::None,
            cells: vec!["ModRM:reg (w)".to_string(), "ModRM:r/m (r)".to_string()],
        }
    }

    #[test]
    fn rm_operand_splits_into_two_forms() {
        let row = row("8B /r", "MOV r32, r/m32", "RM");
        let mut stats = Stats::default();
        let forms =
            forms_from_row(&row, Some(&rm_openc()), &Options::default(), &mut stats).unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(stats.splits, 1);

        assert_eq!(forms[0].operands[1].as_ref().unwrap().name, "r32");
        assert_eq!(forms[1].operands[1].as_ref().unwrap().name, "m32");
        assert_eq!(forms[0].encoding, forms[1].encoding);
        assert_eq!(
            forms[0].operands[0].as_ref().unwrap().encoding,
            OperandEncoding::ModRmReg
        );
    }

    #[test]
    fn r64_operand_clears_narrow_modes() {
        let row = row("REX.W 8B /r", "MOV r64, r64", "RM");
        let mut stats = Stats::default();
        let forms =
            forms_from_row(&row, Some(&rm_openc()), &Options::default(), &mut stats).unwrap();
        assert!(forms[0].mode64);
        assert!(!forms[0].mode32 && !forms[0].mode16);
    }

    #[test]
    fn unqualified_reg_operand_is_rejected() {
        let row = row("0F 00 /0", "SLDT reg", "M");
        let mut stats = Stats::default();
        let err = forms_from_row(&row, None, &Options::default(), &mut stats).unwrap_err();
        assert!(err.to_string().contains("unknown operand"));
    }

    #[test]
    fn two_splitting_operands_are_an_error() {
        let row = row("00 /r", "BAD r/m8, r/m8", "RM");
        let mut stats = Stats::default();
        assert!(forms_from_row(&row, Some(&rm_openc()), &Options::default(), &mut stats).is_err());
    }

    #[test]
    fn missing_vsib_is_patched() {
        let row = row(
            "VEX.128.66.0F38.W0 90 /r",
            "VPGATHERDD xmm1, vm32x, xmm2",
            "RMV",
        );
        let openc = OpEnRow {
            id: "RMV".to_string(),
            tuple: TupleType::None,
            cells: vec![
                "ModRM:reg (r,w)".to_string(),
                "BaseReg (R): VSIB:base".to_string(),
                "VEX.vvvv (r, w)".to_string(),
            ],
        };
        let mut stats = Stats::default();
        let forms =
            forms_from_row(&row, Some(&openc), &Options::default(), &mut stats).unwrap();
        assert!(forms[0].encoding.vsib);
        assert_eq!(stats.vsib_fixes, 1);

        let mut stats = Stats::default();
        let no_fix = Options { vsib_fix: false };
        let forms = forms_from_row(&row, Some(&openc), &no_fix, &mut stats).unwrap();
        assert!(!forms[0].encoding.vsib);
        assert_eq!(stats.vsib_fixes, 0);
    }

    #[test]
    fn evex_decorations_set_prefix_flags() {
        let row = row(
            "EVEX.512.66.0F.W1 58 /r",
            "VADDPD zmm1 {k1}{z}, zmm2, zmm3",
            "RVM",
        );
        let openc = OpEnRow {
            id: "RVM".to_string(),
            tuple: TupleType::Full,
            cells: vec![
                "ModRM:reg (w)".to_string(),
                "EVEX.vvvv (r)".to_string(),
                "ModRM:r/m (r)".to_string(),
            ],
        };
        let mut stats = Stats::default();
        let forms =
            forms_from_row(&row, Some(&openc), &Options::default(), &mut stats).unwrap();
        let form = &forms[0];
        assert!(form.encoding.evex_mask && form.encoding.evex_zero);
        assert!(!form.encoding.evex_rounding);
        assert_eq!(form.tuple_type, TupleType::Full);
        assert_eq!(
            form.operands[1].as_ref().unwrap().encoding,
            OperandEncoding::VexVvvv
        );
    }

    #[test]
    fn rex_rows_collapse() {
        let mut rows = vec![
            row("0F B6 /r", "MOVZX r32, r/m8", "RM"),
            row("REX 0F B6 /r", "MOVZX r32, r/m8", "RM"),
            row("REX.W 0F B6 /r", "MOVZX r64, r/m8", "RM"),
        ];
        let mut stats = Stats::default();
        dedupe_rex_rows(&mut rows, &mut stats);
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.duplicates_dropped, 1);
        assert_eq!(rows[1].opcode, "REX.W 0F B6 /r");
    }

    #[test]
    fn combined_opcode_instruction_cells_split() {
        let (opcode, instruction) =
            split_opcode_instruction("VEX.128.66.0F.W0 6E /r VMOVD xmm1, r32").unwrap();
        assert_eq!(opcode, "VEX.128.66.0F.W0 6E /r");
        assert_eq!(instruction, "VMOVD xmm1, r32");

        let (opcode, instruction) = split_opcode_instruction("13 /r ADC r32, r/m32").unwrap();
        assert_eq!(opcode, "13 /r");
        assert_eq!(instruction, "ADC r32, r/m32");
    }

    #[test]
    fn operand_size_families_are_detected() {
        let mut stats = Stats::default();
        let opts = Options::default();
        let mut forms = Vec::new();
        forms.extend(
            forms_from_row(&row("B8+rd id", "MOV r32, imm32", "OI"), None, &opts, &mut stats)
                .unwrap(),
        );
        forms.extend(
            forms_from_row(&row("B8+rw iw", "MOV r16, imm16", "OI"), None, &opts, &mut stats)
                .unwrap(),
        );
        forms.extend(
            forms_from_row(&row("0F A2", "CPUID", ""), None, &opts, &mut stats).unwrap(),
        );
        detect_operand_size(&mut forms);
        assert!(forms[0].operand_size);
        assert!(forms[1].operand_size);
        assert!(!forms[2].operand_size);
    }

    #[test]
    fn far_forms_are_renamed() {
        let mut stats = Stats::default();
        let opts = Options::default();
        let mut forms = Vec::new();
        forms.extend(
            forms_from_row(&row("9A cp", "CALL ptr16:32", ""), None, &opts, &mut stats).unwrap(),
        );
        forms.extend(
            forms_from_row(&row("CB", "RET", ""), None, &opts, &mut stats).unwrap(),
        );
        forms.extend(
            forms_from_row(&row("C3", "RET", ""), None, &opts, &mut stats).unwrap(),
        );
        rename_far_forms(&mut forms);
        assert_eq!(forms[0].mnemonic, "call-far");
        assert_eq!(forms[1].mnemonic, "ret-far");
        assert_eq!(forms[2].mnemonic, "ret");
    }

    #[test]
    fn uids_are_unique_or_exempt() {
        let mut stats = Stats::default();
        let opts = Options::default();
        let mut forms = forms_from_row(
            &row("C9", "LEAVE", ""),
            None,
            &opts,
            &mut stats,
        )
        .unwrap();
        forms.extend(
            forms_from_row(&row("C9", "LEAVE", ""), None, &opts, &mut stats).unwrap(),
        );
        let out = finalize_uids(forms, &mut stats).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uid, "LEAVE");
        assert_eq!(stats.duplicates_dropped, 1);

        let mut stats = Stats::default();
        let mut forms = forms_from_row(&row("0F A2", "CPUID", ""), None, &opts, &mut stats).unwrap();
        forms.extend(
            forms_from_row(&row("0F A2", "CPUID", ""), None, &opts, &mut stats).unwrap(),
        );
        assert!(finalize_uids(forms, &mut stats).is_err());
    }

    #[test]
    fn verify_accepts_well_formed_forms() {
        let mut stats = Stats::default();
        let opts = Options::default();
        let forms = forms_from_row(
            &row("8B /r", "MOV r32, r/m32", "RM"),
            Some(&rm_openc()),
            &opts,
            &mut stats,
        )
        .unwrap();
        let forms = finalize_uids(forms, &mut stats).unwrap();
        verify(&forms).unwrap();
    }

    #[test]
    fn verify_rejects_mismatched_immediates() {
        let mut stats = Stats::default();
        let opts = Options::default();
        // imm16 against an ib token.
        let forms = forms_from_row(
            &row("CD ib", "INT imm16", ""),
            None,
            &opts,
            &mut stats,
        )
        .unwrap();
        let forms = finalize_uids(forms, &mut stats).unwrap();
        assert!(verify(&forms).is_err());
    }
}
