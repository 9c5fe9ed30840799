//! Static restriction maps: a restriction tag mapped to the ingredient
//! terms that conflict with it. Keys and terms are lower case.

pub type RestrictionMap = &'static [(&'static str, &'static [&'static str])];

pub static ALLERGENS: RestrictionMap = &[
    ("peanut", &["peanut", "groundnut", "arachis", "monkey nut"]),
    (
        "tree nut",
        &[
            "almond", "cashew", "walnut", "pecan", "pistachio", "hazelnut", "macadamia",
            "brazil nut", "pine nut", "praline", "marzipan", "nutella",
        ],
    ),
    (
        "dairy",
        &[
            "milk", "cheese", "butter", "cream", "yogurt", "yoghurt", "whey", "casein", "lactose",
            "ghee", "custard", "ice cream",
        ],
    ),
    ("milk", &["milk", "cheese", "butter", "cream", "yogurt", "whey", "casein", "lactose", "ghee"]),
    ("egg", &["egg", "albumin", "mayonnaise", "meringue", "aioli"]),
    ("soy", &["soy", "soya", "tofu", "edamame", "tempeh", "miso", "tamari"]),
    ("wheat", &["wheat", "flour", "bread", "pasta", "couscous", "semolina", "bulgur", "seitan"]),
    (
        "gluten",
        &[
            "wheat", "barley", "rye", "malt", "flour", "bread", "pasta", "couscous", "semolina",
            "seitan", "spelt",
        ],
    ),
    (
        "fish",
        &[
            "fish", "salmon", "tuna", "cod", "anchovy", "sardine", "trout", "mackerel", "halibut",
            "tilapia",
        ],
    ),
    (
        "shellfish",
        &[
            "shrimp", "prawn", "crab", "lobster", "crayfish", "scallop", "clam", "mussel",
            "oyster", "squid", "calamari",
        ],
    ),
    ("sesame", &["sesame", "tahini", "halva", "hummus"]),
    ("mustard", &["mustard"]),
    ("celery", &["celery", "celeriac"]),
    ("sulfite", &["sulfite", "sulphite", "wine"]),
];

pub static DIETARY_PREFERENCES: RestrictionMap = &[
    (
        "vegan",
        &[
            "meat", "beef", "pork", "chicken", "lamb", "turkey", "bacon", "ham", "sausage",
            "fish", "salmon", "tuna", "shrimp", "prawn", "crab", "egg", "milk", "cheese",
            "butter", "cream", "yogurt", "honey", "gelatin", "whey", "casein",
        ],
    ),
    (
        "vegetarian",
        &[
            "meat", "beef", "pork", "chicken", "lamb", "turkey", "bacon", "ham", "sausage",
            "fish", "salmon", "tuna", "shrimp", "prawn", "crab", "anchovy", "gelatin",
        ],
    ),
    (
        "pescatarian",
        &["meat", "beef", "pork", "chicken", "lamb", "turkey", "bacon", "ham", "sausage"],
    ),
    ("halal", &["pork", "bacon", "ham", "lard", "gelatin", "wine", "beer", "alcohol"]),
    ("kosher", &["pork", "bacon", "ham", "shrimp", "crab", "lobster", "shellfish"]),
    (
        "keto",
        &["sugar", "rice", "bread", "pasta", "potato", "flour", "corn", "syrup", "honey"],
    ),
    ("paleo", &["bread", "pasta", "rice", "bean", "lentil", "peanut", "sugar", "cheese", "milk"]),
    ("dairy-free", &["milk", "cheese", "butter", "cream", "yogurt", "whey", "casein"]),
    ("gluten-free", &["wheat", "barley", "rye", "malt", "flour", "bread", "pasta", "couscous"]),
];

pub static HEALTH_RESTRICTIONS: RestrictionMap = &[
    (
        "diabetes",
        &["sugar", "syrup", "honey", "candy", "chocolate", "soda", "juice", "cake", "dessert"],
    ),
    (
        "hypertension",
        &["salt", "sodium", "soy sauce", "bacon", "ham", "pickle", "cured", "processed"],
    ),
    ("low sodium", &["salt", "sodium", "soy sauce", "bacon", "ham", "pickle", "cured"]),
    (
        "high cholesterol",
        &["butter", "lard", "bacon", "sausage", "fried", "cream", "egg yolk", "organ"],
    ),
    (
        "celiac",
        &["wheat", "barley", "rye", "malt", "flour", "bread", "pasta", "couscous", "seitan"],
    ),
    (
        "lactose intolerance",
        &["milk", "cream", "cheese", "butter", "yogurt", "ice cream", "whey", "lactose"],
    ),
    ("gout", &["organ", "liver", "anchovy", "sardine", "beer", "shellfish", "red meat"]),
    ("kidney disease", &["salt", "sodium", "potassium", "banana", "potato", "tomato"]),
    ("ibs", &["onion", "garlic", "bean", "lentil", "wheat", "apple", "honey"]),
];
