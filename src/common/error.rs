// Unified error format for lexing, preprocessing and runtime

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    // RuntimeError and its subtypes
    RuntimeError,
    NameError,
    ArityError,
    TypeError,
    IndexError,
    KeyError,
    ConstError,
    SyntaxError,
    IOError,
}

impl ErrorType {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorType::RuntimeError => "RuntimeError",
            ErrorType::NameError => "NameError",
            ErrorType::ArityError => "ArityError",
            ErrorType::TypeError => "TypeError",
            ErrorType::IndexError => "IndexError",
            ErrorType::KeyError => "KeyError",
            ErrorType::ConstError => "ConstError",
            ErrorType::SyntaxError => "SyntaxError",
            ErrorType::IOError => "IOError",
        }
    }

    /// Checks whether this error type is `other` or one of its subtypes
    pub fn is_instance_of(&self, other: &ErrorType) -> bool {
        if self == other {
            return true;
        }
        // Every classified runtime failure is a RuntimeError
        matches!(other, ErrorType::RuntimeError)
    }
}

#[derive(Debug, Clone)]
pub struct StackTraceEntry {
    pub function_name: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum LangError {
    LexError { message: String, line: usize },
    PreprocessError { message: String, line: usize },
    RuntimeError {
        message: String,
        line: usize,
        stack_trace: Vec<StackTraceEntry>,
        error_type: Option<ErrorType>,
    },
}

impl LangError {
    pub fn lex_error(message: impl Into<String>, line: usize) -> Self {
        LangError::LexError { message: message.into(), line }
    }

    pub fn preprocess_error(message: impl Into<String>, line: usize) -> Self {
        LangError::PreprocessError { message: message.into(), line }
    }

    pub fn runtime_error(message: impl Into<String>, line: usize) -> Self {
        LangError::RuntimeError {
            message: message.into(),
            line,
            stack_trace: Vec::new(),
            error_type: None,
        }
    }

    pub fn runtime_error_with_type(message: impl Into<String>, line: usize, error_type: ErrorType) -> Self {
        LangError::RuntimeError {
            message: message.into(),
            line,
            stack_trace: Vec::new(),
            error_type: Some(error_type),
        }
    }

    /// Appends a frame to the trace of a runtime error leaving a user function.
    /// Lex and preprocess errors never cross a call, so they pass through unchanged.
    pub fn with_frame(mut self, function_name: &str, line: usize) -> Self {
        if let LangError::RuntimeError { stack_trace, .. } = &mut self {
            stack_trace.push(StackTraceEntry {
                function_name: function_name.to_string(),
                line,
            });
        }
        self
    }

    pub fn line(&self) -> usize {
        match self {
            LangError::LexError { line, .. }
            | LangError::PreprocessError { line, .. }
            | LangError::RuntimeError { line, .. } => *line,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LangError::LexError { message, .. }
            | LangError::PreprocessError { message, .. }
            | LangError::RuntimeError { message, .. } => message,
        }
    }

    /// Error type of a runtime error (if classified)
    pub fn error_type(&self) -> Option<&ErrorType> {
        match self {
            LangError::RuntimeError { error_type, .. } => error_type.as_ref(),
            _ => None,
        }
    }

    pub fn stack_trace(&self) -> &[StackTraceEntry] {
        match self {
            LangError::RuntimeError { stack_trace, .. } => stack_trace,
            _ => &[],
        }
    }

    /// Checks whether the error is of the given type or one of its subtypes
    pub fn is_instance_of(&self, error_type: &ErrorType) -> bool {
        match self {
            LangError::RuntimeError { error_type: Some(et), .. } => et.is_instance_of(error_type),
            LangError::RuntimeError { error_type: None, .. } => error_type == &ErrorType::RuntimeError,
            _ => false,
        }
    }
}

impl std::fmt::Display for LangError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LangError::LexError { message, line } => {
                write!(f, "[Lexer Error] Line {}: {}", line, message)
            }
            LangError::PreprocessError { message, line } => {
                write!(f, "[Preprocess Error] Line {}: {}", line, message)
            }
            LangError::RuntimeError { message, line, stack_trace, error_type } => {
                if let Some(et) = error_type {
                    write!(f, "[{}] Line {}: {}", et.name(), line, message)?;
                } else {
                    write!(f, "[Runtime Error] Line {}: {}", line, message)?;
                }
                for entry in stack_trace {
                    write!(f, "\n  in {}() called at line {}", entry.function_name, entry.line)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LangError {}
