// ABOUTME: plain-text bilingual terminal front end over stdin/stdout.
// ABOUTME: implements the consent prompt session so confirmation stages block on the real user.

use std::io::{self, BufRead, Write};

use haven_consent::{Language, PromptAnswer, PromptSession, StageKind, StagePrompt};

pub struct TerminalUi {
    language: Language,
}

impl TerminalUi {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn line(&self, message: &str) {
        println!("{message}");
    }

    pub fn info(&self, message: &str) {
        println!("[i] {message}");
    }

    pub fn success(&self, message: &str) {
        let prefix = match self.language {
            Language::Ar => "نجح",
            Language::En => "ok",
        };
        println!("[+] {prefix}: {message}");
    }

    pub fn warning(&self, message: &str) {
        println!("[!] {message}");
    }

    pub fn error(&self, message: &str) {
        let prefix = match self.language {
            Language::Ar => "خطأ",
            Language::En => "error",
        };
        eprintln!("[x] {prefix}: {message}");
    }

    pub fn chat_message(&self, role: &str, content: &str) {
        let prefix = match (role, self.language) {
            ("user", Language::Ar) => "أنت",
            ("user", Language::En) => "You",
            _ => "Haven",
        };
        println!("\n{prefix}:\n{content}");
    }

    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        println!("{}", headers.join(" | "));
        println!("{}", headers.iter().map(|h| "-".repeat(h.len())).collect::<Vec<_>>().join("-|-"));
        for row in rows {
            println!("{}", row.join(" | "));
        }
    }

    pub fn format_timestamp(ms: i64) -> String {
        chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ms.to_string())
    }

    /// Read one line; EOF comes back as `None` so callers can exit cleanly.
    pub fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        print!("{label}: ");
        io::stdout().flush()?;
        let mut input = String::new();
        let read = io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub fn confirm(&mut self, question: &str) -> bool {
        match self.prompt(&format!("{question} [y/N]")) {
            Ok(Some(answer)) => {
                let answer = answer.trim().to_lowercase();
                self.language.yes_tokens().contains(&answer.as_str())
            }
            _ => false,
        }
    }

    pub fn welcome(&self) {
        let text = match self.language {
            Language::Ar => {
                "\n=== مرحباً بك في Haven ===\n\
                 رفيقك الذكي الشخصي\n\
                 الفلسفة: \"الإنسان يأمر، الذكاء الاصطناعي يخدم\"\n\
                 اكتب 'help' أو 'مساعدة' للحصول على قائمة الأوامر.\n"
            }
            Language::En => {
                "\n=== Welcome to Haven ===\n\
                 Your personal AI companion\n\
                 Philosophy: \"The human commands, the AI serves\"\n\
                 Type 'help' for a list of commands.\n"
            }
        };
        println!("{text}");
    }

    pub fn help(&self) {
        let text = match self.language {
            Language::Ar => {
                "الأوامر:\n\
                 \u{2007}help | مساعدة      عرض هذه القائمة\n\
                 \u{2007}chat | محادثة      بدء جلسة محادثة\n\
                 \u{2007}history | سجل      عرض سجل المحادثات (history clear للمسح)\n\
                 \u{2007}notes | ملاحظات    إدارة الملاحظات\n\
                 \u{2007}tasks | مهام       إدارة المهام\n\
                 \u{2007}workspace | مساحة  إحصائيات مساحة العمل (workspace export للتصدير)\n\
                 \u{2007}preferences | تفضيلات  عرض التفضيلات\n\
                 \u{2007}language <ar|en>   تغيير اللغة\n\
                 \u{2007}github / azure     قوائم التكامل\n\
                 \u{2007}clear | مسح        مسح الشاشة\n\
                 \u{2007}exit | خروج        الخروج"
            }
            Language::En => {
                "Commands:\n\
                 \u{2007}help               show this list\n\
                 \u{2007}chat               start a chat session\n\
                 \u{2007}history            show conversation history (history clear to wipe)\n\
                 \u{2007}notes              manage notes\n\
                 \u{2007}tasks              manage tasks\n\
                 \u{2007}workspace          workspace stats (workspace export to export)\n\
                 \u{2007}preferences        show preferences\n\
                 \u{2007}language <ar|en>   switch language\n\
                 \u{2007}github / azure     integration menus\n\
                 \u{2007}clear              clear the screen\n\
                 \u{2007}exit               quit"
            }
        };
        println!("{text}");
    }

    pub fn clear_screen(&self) {
        print!("\x1b[2J\x1b[H");
        let _ = io::stdout().flush();
    }
}

impl PromptSession for TerminalUi {
    fn ask(&mut self, prompt: &StagePrompt) -> PromptAnswer {
        println!();
        if prompt.total_stages > 1 {
            let step = match self.language {
                Language::Ar => "خطوة",
                Language::En => "step",
            };
            println!("[consent] {step} {}/{}", prompt.stage, prompt.total_stages);
        }
        println!("{}", prompt.text);

        let label = match prompt.kind {
            StageKind::YesNo | StageKind::Warning => "[y/N]",
            StageKind::TypedConfirmation => ">",
        };
        match self.prompt(label) {
            Ok(Some(answer)) => PromptAnswer::Text(answer),
            // EOF or an io failure aborts the whole flow.
            _ => PromptAnswer::Cancel,
        }
    }
}
