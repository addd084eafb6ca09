/// Two character command codes understood by the WR3223 controller.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wr3223Command {
    // temperatures
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    // status, relays, errors, EVU blockade
    Ta,
    RL,
    ER,
    Tf,
    // keep-alive / status write
    SW,
    // operating values
    LS,
    NA,
    NZ,
    MD,
    SP,
    RA,
    E1,
    E2,
    E3,
    E5,
    E6,
    E7,
    E8,
    L1,
    L2,
    L3,
    ES,
    EW,
    // defrosting
    AE,
    AA,
    Az,
    AP,
    AN,
    AR,
    // solar and heat pump
    SM,
    SN,
    DA,
    DE,
    KM,
    PA,
    S1,
    S2,
    S3,
    VA,
    VZ,
    WW,
    WP,
    ZH,
}

impl Wr3223Command {
    pub fn code(&self) -> &'static str {
        use Wr3223Command::*;

        match self {
            T1 => "T1",
            T2 => "T2",
            T3 => "T3",
            T4 => "T4",
            T5 => "T5",
            T6 => "T6",
            T7 => "T7",
            T8 => "T8",
            Ta => "Ta",
            RL => "RL",
            ER => "ER",
            Tf => "Tf",
            SW => "SW",
            LS => "LS",
            NA => "NA",
            NZ => "NZ",
            MD => "MD",
            SP => "SP",
            RA => "RA",
            E1 => "E1",
            E2 => "E2",
            E3 => "E3",
            E5 => "E5",
            E6 => "E6",
            E7 => "E7",
            E8 => "E8",
            L1 => "L1",
            L2 => "L2",
            L3 => "L3",
            ES => "ES",
            EW => "EW",
            AE => "AE",
            AA => "AA",
            Az => "Az",
            AP => "AP",
            AN => "AN",
            AR => "AR",
            SM => "SM",
            SN => "SN",
            DA => "DA",
            DE => "DE",
            KM => "KM",
            PA => "PA",
            S1 => "S1",
            S2 => "S2",
            S3 => "S3",
            VA => "VA",
            VZ => "VZ",
            WW => "WW",
            WP => "WP",
            ZH => "ZH",
        }
    }

    /// The two bytes sent on the wire.
    pub fn bytes(&self) -> [u8; 2] {
        let code = self.code().as_bytes();
        [code[0], code[1]]
    }
}

impl std::fmt::Display for Wr3223Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
