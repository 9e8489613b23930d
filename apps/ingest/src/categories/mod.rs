// Categories: named, coloured groups the record API files resumes under.

pub mod handlers;
