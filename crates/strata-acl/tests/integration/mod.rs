mod provision;
mod reset;
