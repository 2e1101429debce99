use anyhow::{anyhow, Context};

use crate::docx::xml::{parse_xml_tree, XmlElement};
use crate::equation::convert::FormulaConverter;

#[derive(Clone, Copy, Debug, Default)]
pub struct MathmlToLatex;

impl FormulaConverter for MathmlToLatex {
    fn convert(&self, mathml: &str) -> anyhow::Result<String> {
        mathml_to_latex(mathml)
    }
}

pub fn mathml_to_latex(mathml: &str) -> anyhow::Result<String> {
    let root = parse_xml_tree(mathml).context("parse mathml")?;
    if root.local_name() != "math" {
        return Err(anyhow!("expected <math> root, got <{}>", root.name));
    }
    let latex = render_children(&root);
    let latex = latex.trim();
    if latex.is_empty() {
        return Err(anyhow!("mathml produced an empty formula"));
    }
    Ok(latex.to_string())
}

/// Accumulates LaTeX, separating a control word from a following letter.
#[derive(Default)]
struct Latex {
    buf: String,
}

impl Latex {
    fn push(&mut self, piece: &str) {
        if piece.is_empty() {
            return;
        }
        if ends_with_control_word(&self.buf) && piece.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            self.buf.push(' ');
        }
        self.buf.push_str(piece);
    }
}

fn ends_with_control_word(s: &str) -> bool {
    let stem = s.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    stem.len() != s.len() && stem.ends_with('\\') && !stem.ends_with("\\\\")
}

fn render_children(el: &XmlElement) -> String {
    let mut out = Latex::default();
    for child in el.elements() {
        out.push(&render(child));
    }
    out.buf
}

fn nth_child(el: &XmlElement, n: usize) -> String {
    el.elements().nth(n).map(render).unwrap_or_default()
}

fn render(el: &XmlElement) -> String {
    match el.local_name() {
        "mi" => identifier(el),
        "mn" => map_chars(el.text_content().trim()),
        "mo" => operator(el.text_content().trim()),
        "mtext" => text(&el.text_content()),
        "ms" => format!("\\text{{\"{}\"}}", escape_text(&el.text_content())),
        "mspace" => " ".to_string(),
        "semantics" => semantics(el),
        "annotation" | "annotation-xml" | "none" | "mprescripts" => String::new(),
        "mphantom" => format!("\\phantom{{{}}}", render_children(el)),
        "msup" => script(&nth_child(el, 0), None, Some(&nth_child(el, 1))),
        "msub" => script(&nth_child(el, 0), Some(&nth_child(el, 1)), None),
        "msubsup" => script(
            &nth_child(el, 0),
            Some(&nth_child(el, 1)),
            Some(&nth_child(el, 2)),
        ),
        "mmultiscripts" => multiscripts(el),
        "munder" => under_over(el, Some(1), None),
        "mover" => under_over(el, None, Some(1)),
        "munderover" => under_over(el, Some(1), Some(2)),
        "mfrac" => fraction(el),
        "msqrt" => format!("\\sqrt{{{}}}", render_children(el)),
        "mroot" => format!("\\sqrt[{}]{{{}}}", nth_child(el, 1), nth_child(el, 0)),
        "mfenced" => fenced(el),
        "menclose" => enclose(el),
        "mtable" => table(el),
        "mtr" | "mlabeledtr" => el
            .elements()
            .map(render)
            .collect::<Vec<_>>()
            .join(" & "),
        _ => render_children(el),
    }
}

fn identifier(el: &XmlElement) -> String {
    let raw = el.text_content();
    let name = raw.trim();
    if name.is_empty() {
        return String::new();
    }
    let body = if name.chars().count() == 1 {
        map_chars(name)
    } else if FUNCTION_NAMES.contains(&name) {
        format!("\\{name}")
    } else if name.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("\\mathrm{{{name}}}")
    } else {
        map_chars(name)
    };
    match el.attr("mathvariant") {
        Some("bold") => format!("\\mathbf{{{body}}}"),
        Some("double-struck") => format!("\\mathbb{{{body}}}"),
        Some("script") => format!("\\mathcal{{{body}}}"),
        Some("fraktur") => format!("\\mathfrak{{{body}}}"),
        _ => body,
    }
}

fn operator(op: &str) -> String {
    if FUNCTION_NAMES.contains(&op) {
        return format!("\\{op}");
    }
    match op {
        "~" => "\\sim".to_string(),
        "^" => "\\hat{}".to_string(),
        _ => map_chars(op),
    }
}

fn text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return " ".to_string();
    }
    format!("\\text{{{}}}", escape_text(raw))
}

fn semantics(el: &XmlElement) -> String {
    let tex = el.elements().find(|e| {
        e.local_name() == "annotation"
            && matches!(e.attr("encoding"), Some("application/x-tex") | Some("TeX") | Some("LaTeX"))
    });
    if let Some(ann) = tex {
        let t = ann.text_content();
        if !t.trim().is_empty() {
            return t.trim().to_string();
        }
    }
    nth_child(el, 0)
}

fn script(base: &str, sub: Option<&str>, sup: Option<&str>) -> String {
    let mut out = script_base(base);
    if let Some(s) = sub {
        out.push_str(&format!("_{{{s}}}"));
    }
    if let Some(s) = sup {
        out.push_str(&format!("^{{{s}}}"));
    }
    out
}

fn script_base(base: &str) -> String {
    let is_control_word = base.len() > 1
        && base.starts_with('\\')
        && base[1..].chars().all(|c| c.is_ascii_alphabetic());
    if base.chars().count() == 1 || is_control_word {
        base.to_string()
    } else {
        format!("{{{base}}}")
    }
}

fn multiscripts(el: &XmlElement) -> String {
    let children: Vec<&XmlElement> = el.elements().collect();
    let Some(base) = children.first() else {
        return String::new();
    };
    let mut out = script_base(&render(base));
    for pair in children[1..].chunks(2) {
        if pair[0].local_name() == "mprescripts" {
            break;
        }
        let sub = render(pair[0]);
        let sup = pair.get(1).map(|e| render(e)).unwrap_or_default();
        if !sub.is_empty() {
            out.push_str(&format!("_{{{sub}}}"));
        }
        if !sup.is_empty() {
            out.push_str(&format!("^{{{sup}}}"));
        }
    }
    out
}

fn under_over(el: &XmlElement, under_idx: Option<usize>, over_idx: Option<usize>) -> String {
    let base = nth_child(el, 0);
    let under = under_idx.map(|i| nth_child(el, i));
    let over = over_idx.map(|i| nth_child(el, i));
    let under_raw = under_idx.and_then(|i| el.elements().nth(i)).map(|e| e.text_content());
    let over_raw = over_idx.and_then(|i| el.elements().nth(i)).map(|e| e.text_content());

    if LARGE_OPERATORS.iter().any(|op| base.starts_with(op)) {
        return script(&base, under.as_deref(), over.as_deref());
    }

    let mut out = base;
    if let Some(raw) = under_raw {
        out = match raw.trim() {
            "_" | "¯" | "‾" | "\u{0332}" => format!("\\underline{{{out}}}"),
            "⏟" | "\u{FE38}" => format!("\\underbrace{{{out}}}"),
            _ => format!("\\underset{{{}}}{{{out}}}", under.unwrap_or_default()),
        };
    }
    if let Some(raw) = over_raw {
        out = match raw.trim() {
            "¯" | "‾" | "_" | "\u{0305}" | "―" => format!("\\overline{{{out}}}"),
            "^" | "ˆ" | "\u{0302}" => format!("\\hat{{{out}}}"),
            "~" | "˜" | "\u{0303}" => format!("\\tilde{{{out}}}"),
            "→" | "\u{20D7}" => format!("\\vec{{{out}}}"),
            "←" => format!("\\overleftarrow{{{out}}}"),
            "↔" => format!("\\overleftrightarrow{{{out}}}"),
            "˙" | "." | "\u{0307}" => format!("\\dot{{{out}}}"),
            "¨" | "\u{0308}" => format!("\\ddot{{{out}}}"),
            "ˇ" => format!("\\check{{{out}}}"),
            "˘" => format!("\\breve{{{out}}}"),
            "⏞" | "\u{FE37}" => format!("\\overbrace{{{out}}}"),
            _ => format!("\\overset{{{}}}{{{out}}}", over.unwrap_or_default()),
        };
    }
    out
}

fn fraction(el: &XmlElement) -> String {
    let num = nth_child(el, 0);
    let den = nth_child(el, 1);
    let thickness = el.attr("linethickness").map(str::trim).unwrap_or("");
    if matches!(thickness, "0" | "0px" | "0pt" | "0em") {
        format!("\\genfrac{{}}{{}}{{0pt}}{{}}{{{num}}}{{{den}}}")
    } else if el.attr("bevelled") == Some("true") {
        format!("{}/{}", script_base(&num), script_base(&den))
    } else {
        format!("\\frac{{{num}}}{{{den}}}")
    }
}

fn fenced(el: &XmlElement) -> String {
    let open = el.attr("open").unwrap_or("(");
    let close = el.attr("close").unwrap_or(")");
    let separators: Vec<char> = el
        .attr("separators")
        .unwrap_or(",")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let mut inner = Latex::default();
    for (i, child) in el.elements().enumerate() {
        if i > 0 {
            if let Some(sep) = separators.get((i - 1).min(separators.len().saturating_sub(1))) {
                inner.push(&map_chars(&sep.to_string()));
            }
        }
        inner.push(&render(child));
    }
    format!(
        "\\left{}{}\\right{}",
        delimiter(open),
        inner.buf,
        delimiter(close)
    )
}

fn delimiter(d: &str) -> String {
    match d.trim() {
        "" => ".".to_string(),
        "{" => "\\{".to_string(),
        "}" => "\\}".to_string(),
        "‖" => "\\|".to_string(),
        "⟨" | "〈" => "\\langle ".to_string(),
        "⟩" | "〉" => "\\rangle ".to_string(),
        "⌊" => "\\lfloor ".to_string(),
        "⌋" => "\\rfloor ".to_string(),
        "⌈" => "\\lceil ".to_string(),
        "⌉" => "\\rceil ".to_string(),
        other => other.to_string(),
    }
}

fn enclose(el: &XmlElement) -> String {
    let inner = render_children(el);
    let notation = el.attr("notation").unwrap_or("longdiv");
    if notation.contains("box") {
        format!("\\boxed{{{inner}}}")
    } else if notation.contains("strike") {
        format!("\\cancel{{{inner}}}")
    } else {
        inner
    }
}

fn table(el: &XmlElement) -> String {
    let rows: Vec<String> = el.elements().map(render).collect();
    format!("\\begin{{matrix}}{}\\end{{matrix}}", rows.join(" \\\\ "))
}

fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '{' | '}' | '#' | '$' | '%' | '&' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            '\\' => out.push_str("\\textbackslash{}"),
            '^' => out.push_str("\\^{}"),
            '~' => out.push_str("\\~{}"),
            '\u{00A0}' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

fn map_chars(s: &str) -> String {
    let mut out = Latex::default();
    for ch in s.chars() {
        match symbol(ch) {
            Some(cmd) => out.push(cmd),
            None => {
                let mut buf = [0u8; 4];
                out.push(ch.encode_utf8(&mut buf));
            }
        }
    }
    out.buf
}

const FUNCTION_NAMES: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan", "sinh", "cosh",
    "tanh", "coth", "log", "ln", "lg", "exp", "lim", "max", "min", "sup", "inf", "det", "dim",
    "ker", "deg", "gcd", "arg", "Pr", "hom",
];

const LARGE_OPERATORS: &[&str] = &[
    "\\sum", "\\prod", "\\coprod", "\\int", "\\iint", "\\iiint", "\\oint", "\\bigcup",
    "\\bigcap", "\\lim", "\\max", "\\min", "\\sup", "\\inf",
];

fn symbol(ch: char) -> Option<&'static str> {
    let s = match ch {
        'α' => "\\alpha",
        'β' => "\\beta",
        'γ' => "\\gamma",
        'δ' => "\\delta",
        'ε' => "\\varepsilon",
        'ϵ' => "\\epsilon",
        'ζ' => "\\zeta",
        'η' => "\\eta",
        'θ' => "\\theta",
        'ϑ' => "\\vartheta",
        'ι' => "\\iota",
        'κ' => "\\kappa",
        'λ' => "\\lambda",
        'μ' => "\\mu",
        'ν' => "\\nu",
        'ξ' => "\\xi",
        'π' => "\\pi",
        'ϖ' => "\\varpi",
        'ρ' => "\\rho",
        'ϱ' => "\\varrho",
        'σ' => "\\sigma",
        'ς' => "\\varsigma",
        'τ' => "\\tau",
        'υ' => "\\upsilon",
        'φ' => "\\varphi",
        'ϕ' => "\\phi",
        'χ' => "\\chi",
        'ψ' => "\\psi",
        'ω' => "\\omega",
        'Γ' => "\\Gamma",
        'Δ' => "\\Delta",
        'Θ' => "\\Theta",
        'Λ' => "\\Lambda",
        'Ξ' => "\\Xi",
        'Π' => "\\Pi",
        'Σ' => "\\Sigma",
        'Υ' => "\\Upsilon",
        'Φ' => "\\Phi",
        'Ψ' => "\\Psi",
        'Ω' => "\\Omega",
        '±' => "\\pm",
        '∓' => "\\mp",
        '×' => "\\times",
        '÷' => "\\div",
        '·' | '⋅' => "\\cdot",
        '∗' => "\\ast",
        '∘' => "\\circ",
        '•' => "\\bullet",
        '−' => "-",
        '≤' | '⩽' => "\\leq",
        '≥' | '⩾' => "\\geq",
        '≠' => "\\neq",
        '≈' => "\\approx",
        '≡' => "\\equiv",
        '∼' => "\\sim",
        '≃' => "\\simeq",
        '≅' => "\\cong",
        '∝' => "\\propto",
        '≪' => "\\ll",
        '≫' => "\\gg",
        '→' => "\\rightarrow",
        '←' => "\\leftarrow",
        '↔' => "\\leftrightarrow",
        '⇒' => "\\Rightarrow",
        '⇐' => "\\Leftarrow",
        '⇔' => "\\Leftrightarrow",
        '↦' => "\\mapsto",
        '↑' => "\\uparrow",
        '↓' => "\\downarrow",
        '∞' => "\\infty",
        '∂' => "\\partial",
        '∇' => "\\nabla",
        '∑' => "\\sum",
        '∏' => "\\prod",
        '∐' => "\\coprod",
        '∫' => "\\int",
        '∬' => "\\iint",
        '∭' => "\\iiint",
        '∮' => "\\oint",
        '∈' => "\\in",
        '∉' => "\\notin",
        '∋' => "\\ni",
        '⊂' => "\\subset",
        '⊃' => "\\supset",
        '⊆' => "\\subseteq",
        '⊇' => "\\supseteq",
        '∪' => "\\cup",
        '∩' => "\\cap",
        '⋃' => "\\bigcup",
        '⋂' => "\\bigcap",
        '∅' => "\\emptyset",
        '∀' => "\\forall",
        '∃' => "\\exists",
        '¬' => "\\neg",
        '∧' => "\\wedge",
        '∨' => "\\vee",
        '⊕' => "\\oplus",
        '⊗' => "\\otimes",
        '⊥' => "\\perp",
        '∥' => "\\parallel",
        '∠' => "\\angle",
        '°' => "^{\\circ}",
        '′' => "'",
        '″' => "''",
        '…' => "\\ldots",
        '⋯' => "\\cdots",
        '⋮' => "\\vdots",
        '⋱' => "\\ddots",
        'ℝ' => "\\mathbb{R}",
        'ℕ' => "\\mathbb{N}",
        'ℤ' => "\\mathbb{Z}",
        'ℚ' => "\\mathbb{Q}",
        'ℂ' => "\\mathbb{C}",
        'ℏ' => "\\hbar",
        'ℓ' => "\\ell",
        '∖' => "\\setminus",
        '∴' => "\\therefore",
        '∵' => "\\because",
        '⟨' | '〈' => "\\langle",
        '⟩' | '〉' => "\\rangle",
        '{' => "\\{",
        '}' => "\\}",
        '#' => "\\#",
        '$' => "\\$",
        '%' => "\\%",
        '&' => "\\&",
        '_' => "\\_",
        '\\' => "\\backslash",
        '\u{00A0}' => "~",
        // Invisible operators: function application, times, separator, plus.
        '\u{2061}' | '\u{2062}' | '\u{2063}' | '\u{2064}' => "",
        _ => return None,
    };
    Some(s)
}
