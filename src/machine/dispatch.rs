//! Dense opcode dispatch tables, built per story version

/// Every operation the interpreter knows, named by its mnemonic.
///
/// Dispatch is a dense table lookup from the decoded form and opcode number
/// to one of these, then a single match in the executor. The Display
/// implementation supplies the disassembler mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)] // the mnemonics name themselves
pub enum Op {
    /// Slot not legal for the running version.
    Illegal,

    // Zero-operand instructions.
    Rtrue,
    Rfalse,
    Print,
    PrintRet,
    Nop,
    /// `save ?(label)` (v1-3).
    #[strum(serialize = "save")]
    SaveBranch,
    /// `save -> (result)` (v4).
    #[strum(serialize = "save")]
    SaveStore,
    /// `restore ?(label)` (v1-3).
    #[strum(serialize = "restore")]
    RestoreBranch,
    /// `restore -> (result)` (v4).
    #[strum(serialize = "restore")]
    RestoreStore,
    Restart,
    RetPopped,
    Pop,
    Catch,
    Quit,
    NewLine,
    ShowStatus,
    Verify,
    Piracy,

    // One-operand instructions.
    Jz,
    GetSibling,
    GetChild,
    GetParent,
    GetPropLen,
    Inc,
    Dec,
    PrintAddr,
    #[strum(serialize = "call_1s")]
    Call1s,
    RemoveObj,
    PrintObj,
    Ret,
    Jump,
    PrintPaddr,
    Load,
    Not,
    #[strum(serialize = "call_1n")]
    Call1n,

    // Two-operand instructions.
    Je,
    Jl,
    Jg,
    DecChk,
    IncChk,
    Jin,
    Test,
    Or,
    And,
    TestAttr,
    SetAttr,
    ClearAttr,
    Store,
    InsertObj,
    Loadw,
    Loadb,
    GetProp,
    GetPropAddr,
    GetNextProp,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    #[strum(serialize = "call_2s")]
    Call2s,
    #[strum(serialize = "call_2n")]
    Call2n,
    SetColour,
    Throw,

    // Variable-operand instructions.
    CallVs,
    Storew,
    Storeb,
    PutProp,
    /// `sread`: status line in v1-3, timeout from v4.
    Sread,
    Aread,
    PrintChar,
    PrintNum,
    Random,
    Push,
    Pull,
    SplitWindow,
    SetWindow,
    #[strum(serialize = "call_vs2")]
    CallVs2,
    EraseWindow,
    EraseLine,
    SetCursor,
    GetCursor,
    SetTextStyle,
    BufferMode,
    OutputStream,
    InputStream,
    SoundEffect,
    ReadChar,
    ScanTable,
    CallVn,
    #[strum(serialize = "call_vn2")]
    CallVn2,
    Tokenise,
    EncodeText,
    CopyTable,
    PrintTable,
    CheckArgCount,

    // Extended instructions.
    SaveTable,
    RestoreTable,
    LogShift,
    ArtShift,
    SetFont,
    DrawPicture,
    PictureData,
    ErasePicture,
    SetMargins,
    SaveUndo,
    RestoreUndo,
    PrintUnicode,
    CheckUnicode,
    MoveWindow,
    WindowSize,
    WindowStyle,
    GetWindProp,
    ScrollWindow,
    PopStack,
    ReadMouse,
    MouseWindow,
    PushStack,
    PutWindProp,
    PrintForm,
    MakeMenu,
    PictureTable,
}

/// The five dispatch tables, indexed by the low bits of the opcode.
#[derive(Debug, Clone)]
pub struct DispatchTables {
    /// Zero-operand table.
    pub op0: [Op; 16],
    /// One-operand table.
    pub op1: [Op; 16],
    /// Two-operand table (long and variable forms).
    pub op2: [Op; 32],
    /// Variable-operand table.
    pub opv: [Op; 32],
    /// Extended table (`0xBE` prefix).
    pub ope: [Op; 32],
}

impl DispatchTables {
    /// Build the tables for a story version; slots that are not legal on
    /// that version trap to [`Op::Illegal`].
    pub fn new(version: u8) -> Self {
        use Op::*;

        let v = version;
        let pick = |cond: bool, yes: Op| if cond { yes } else { Illegal };

        let op0 = [
            Rtrue,
            Rfalse,
            Print,
            PrintRet,
            Nop,
            if v <= 3 {
                SaveBranch
            } else if v == 4 {
                SaveStore
            } else {
                Illegal
            },
            if v <= 3 {
                RestoreBranch
            } else if v == 4 {
                RestoreStore
            } else {
                Illegal
            },
            Restart,
            RetPopped,
            if v <= 4 { Pop } else { Catch },
            Quit,
            NewLine,
            if v <= 2 {
                Illegal
            } else if v == 3 {
                ShowStatus
            } else {
                Nop
            },
            pick(v >= 3, Verify),
            // 0xBE is the extended prefix, decoded before the table.
            Illegal,
            pick(v >= 5, Piracy),
        ];

        let op1 = [
            Jz,
            GetSibling,
            GetChild,
            GetParent,
            GetPropLen,
            Inc,
            Dec,
            PrintAddr,
            pick(v >= 4, Call1s),
            RemoveObj,
            PrintObj,
            Ret,
            Jump,
            PrintPaddr,
            Load,
            if v <= 4 { Not } else { Call1n },
        ];

        let op2 = [
            Illegal,
            Je,
            Jl,
            Jg,
            DecChk,
            IncChk,
            Jin,
            Test,
            Or,
            And,
            TestAttr,
            SetAttr,
            ClearAttr,
            Store,
            InsertObj,
            Loadw,
            Loadb,
            GetProp,
            GetPropAddr,
            GetNextProp,
            Add,
            Sub,
            Mul,
            Div,
            Mod,
            pick(v >= 4, Call2s),
            pick(v >= 5, Call2n),
            pick(v >= 5, SetColour),
            pick(v >= 5, Throw),
            Illegal,
            Illegal,
            Illegal,
        ];

        let opv = [
            CallVs,
            Storew,
            Storeb,
            PutProp,
            if v <= 4 { Sread } else { Aread },
            PrintChar,
            PrintNum,
            Random,
            Push,
            Pull,
            pick(v >= 3, SplitWindow),
            pick(v >= 3, SetWindow),
            pick(v >= 4, CallVs2),
            pick(v >= 4, EraseWindow),
            pick(v >= 4, EraseLine),
            pick(v >= 4, SetCursor),
            pick(v >= 4, GetCursor),
            pick(v >= 4, SetTextStyle),
            pick(v >= 4, BufferMode),
            pick(v >= 3, OutputStream),
            pick(v >= 3, InputStream),
            pick(v >= 5, SoundEffect),
            pick(v >= 4, ReadChar),
            pick(v >= 4, ScanTable),
            pick(v >= 5, Not),
            pick(v >= 5, CallVn),
            pick(v >= 5, CallVn2),
            pick(v >= 5, Tokenise),
            pick(v >= 5, EncodeText),
            pick(v >= 5, CopyTable),
            pick(v >= 5, PrintTable),
            pick(v >= 5, CheckArgCount),
        ];

        let mut ope = [Illegal; 32];
        if v >= 5 {
            ope[0x00] = SaveTable;
            ope[0x01] = RestoreTable;
            ope[0x02] = LogShift;
            ope[0x03] = ArtShift;
            ope[0x04] = SetFont;
            ope[0x09] = SaveUndo;
            ope[0x0A] = RestoreUndo;
            ope[0x0B] = PrintUnicode;
            ope[0x0C] = CheckUnicode;
        }
        if v == 6 {
            ope[0x05] = DrawPicture;
            ope[0x06] = PictureData;
            ope[0x07] = ErasePicture;
            ope[0x08] = SetMargins;
            ope[0x10] = MoveWindow;
            ope[0x11] = WindowSize;
            ope[0x12] = WindowStyle;
            ope[0x13] = GetWindProp;
            ope[0x14] = ScrollWindow;
            ope[0x15] = PopStack;
            ope[0x16] = ReadMouse;
            ope[0x17] = MouseWindow;
            ope[0x18] = PushStack;
            ope[0x19] = PutWindProp;
            ope[0x1A] = PrintForm;
            ope[0x1B] = MakeMenu;
            ope[0x1C] = PictureTable;
        }

        Self {
            op0,
            op1,
            op2,
            opv,
            ope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conditioned_slots() {
        let v3 = DispatchTables::new(3);
        assert_eq!(v3.op0[0x5], Op::SaveBranch);
        assert_eq!(v3.op0[0x9], Op::Pop);
        assert_eq!(v3.op0[0xC], Op::ShowStatus);
        assert_eq!(v3.op1[0xF], Op::Not);
        assert_eq!(v3.op2[0x19], Op::Illegal);
        assert_eq!(v3.opv[0x04], Op::Sread);
        assert_eq!(v3.ope[0x09], Op::Illegal);

        let v4 = DispatchTables::new(4);
        assert_eq!(v4.op0[0x5], Op::SaveStore);
        assert_eq!(v4.op0[0xC], Op::Nop);
        assert_eq!(v4.op2[0x19], Op::Call2s);

        let v5 = DispatchTables::new(5);
        assert_eq!(v5.op0[0x5], Op::Illegal);
        assert_eq!(v5.op0[0x9], Op::Catch);
        assert_eq!(v5.op1[0xF], Op::Call1n);
        assert_eq!(v5.opv[0x04], Op::Aread);
        assert_eq!(v5.ope[0x09], Op::SaveUndo);
        assert_eq!(v5.ope[0x10], Op::Illegal);

        let v6 = DispatchTables::new(6);
        assert_eq!(v6.ope[0x10], Op::MoveWindow);
        assert_eq!(v6.ope[0x1A], Op::PrintForm);
    }

    #[test]
    fn mnemonics_render_in_snake_case() {
        assert_eq!(Op::GetSibling.to_string(), "get_sibling");
        assert_eq!(Op::Call1s.to_string(), "call_1s");
        assert_eq!(Op::SaveBranch.to_string(), "save");
        assert_eq!(Op::Je.to_string(), "je");
    }
}
